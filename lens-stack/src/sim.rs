//! Simulated lens stack devices.
//!
//! Stand-ins for the stage motors, the attenuator, the lens cartridge and the
//! operator, used by tests and by the `sim-align` command of `lens_tool`.

use std::collections::VecDeque;

use crate::alignment::{JogOutcome, OperatorInput};
use crate::interlock::Attenuator;
use crate::motion::{Motor, Stage};
use crate::xfls::StatePositioner;

/// Motor that moves instantly and records every move command.
#[derive(Debug, Clone)]
pub struct SimMotor {
    position: f64,
    limits: (f64, f64),
    moves: Vec<f64>,
}

impl SimMotor {
    /// Motor at 0 with the given travel limits
    pub fn new(limits: (f64, f64)) -> Self {
        Self {
            position: 0.0,
            limits,
            moves: Vec::new(),
        }
    }

    /// Start at a given position without recording a move
    pub fn at(mut self, position: f64) -> Self {
        self.position = position;
        self
    }

    /// Every commanded target, in order
    pub fn moves(&self) -> &[f64] {
        &self.moves
    }

    pub fn move_count(&self) -> usize {
        self.moves.len()
    }
}

impl Motor for SimMotor {
    fn position(&mut self) -> Result<f64, String> {
        Ok(self.position)
    }

    fn move_to(&mut self, value: f64) -> Result<(), String> {
        self.moves.push(value);
        let (low, high) = self.limits;
        if !(low..=high).contains(&value) {
            return Err(format!("target {value} outside limits ({low}, {high})"));
        }
        self.position = value;
        Ok(())
    }

    fn limits(&self) -> (f64, f64) {
        self.limits
    }
}

/// Simulated stage with ±10 travel on x and y and ±100 on z, all at 0
pub fn sim_stage() -> Stage<SimMotor> {
    Stage::new(
        SimMotor::new((-10.0, 10.0)),
        SimMotor::new((-10.0, 10.0)),
        SimMotor::new((-100.0, 100.0)),
    )
}

#[derive(Debug, Clone)]
struct SimFilter {
    thickness: f64,
    inserted: bool,
    stuck: bool,
}

/// Attenuator whose filters insert immediately unless marked stuck.
#[derive(Debug, Clone, Default)]
pub struct SimAttenuator {
    filters: Vec<SimFilter>,
    fault: Option<String>,
    insert_calls: usize,
}

impl SimAttenuator {
    /// All filters retracted, thicknesses in meters
    pub fn new(thicknesses: &[f64]) -> Self {
        Self {
            filters: thicknesses
                .iter()
                .map(|&thickness| SimFilter {
                    thickness,
                    inserted: false,
                    stuck: false,
                })
                .collect(),
            fault: None,
            insert_calls: 0,
        }
    }

    /// Filter `index` ignores insert commands
    pub fn with_stuck(mut self, index: usize) -> Self {
        if let Some(filter) = self.filters.get_mut(index) {
            filter.stuck = true;
        }
        self
    }

    /// Every insert command fails with `message`
    pub fn with_fault(mut self, message: impl Into<String>) -> Self {
        self.fault = Some(message.into());
        self
    }

    pub fn set_inserted(&mut self, index: usize, inserted: bool) {
        if let Some(filter) = self.filters.get_mut(index) {
            filter.inserted = inserted;
        }
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls
    }
}

impl Attenuator for SimAttenuator {
    fn filter_count(&self) -> usize {
        self.filters.len()
    }

    fn thickness(&self, index: usize) -> f64 {
        self.filters.get(index).map_or(0.0, |f| f.thickness)
    }

    fn is_inserted(&self, index: usize) -> bool {
        self.filters.get(index).is_some_and(|f| f.inserted)
    }

    fn insert(&mut self, index: usize) -> Result<(), String> {
        self.insert_calls += 1;
        if let Some(fault) = &self.fault {
            return Err(fault.clone());
        }
        let filter = self
            .filters
            .get_mut(index)
            .ok_or_else(|| format!("no filter {index}"))?;
        if !filter.stuck {
            filter.inserted = true;
        }
        Ok(())
    }
}

/// One scripted operator action
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JogStep {
    /// Jog x and y to a position, then accept it
    MoveTo { x: f64, y: f64 },
    /// Accept the current position without jogging
    Accept,
    /// Quit the jog session
    Cancel,
}

/// Operator replaying a fixed list of jog steps.
#[derive(Debug, Clone, Default)]
pub struct ScriptedOperator {
    steps: VecDeque<JogStep>,
}

impl ScriptedOperator {
    pub fn new(steps: Vec<JogStep>) -> Self {
        Self {
            steps: steps.into(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.steps.len()
    }
}

impl OperatorInput for ScriptedOperator {
    fn jog(&mut self, x: &mut dyn Motor, y: &mut dyn Motor) -> Result<JogOutcome, String> {
        match self.steps.pop_front() {
            Some(JogStep::MoveTo { x: tx, y: ty }) => {
                x.move_to(tx)?;
                y.move_to(ty)?;
                Ok(JogOutcome::Accepted)
            }
            Some(JogStep::Accept) => Ok(JogOutcome::Accepted),
            Some(JogStep::Cancel) => Ok(JogOutcome::Cancelled),
            None => Err("operator script exhausted".to_string()),
        }
    }
}

/// Named-state device that reaches any commanded state instantly.
#[derive(Debug, Clone)]
pub struct SimStatePositioner {
    states: Vec<String>,
    current: String,
}

impl SimStatePositioner {
    /// Device with the given state names, starting in `initial`
    pub fn new(states: &[&str], initial: &str) -> Self {
        Self {
            states: states.iter().map(|s| s.to_string()).collect(),
            current: initial.to_string(),
        }
    }
}

impl StatePositioner for SimStatePositioner {
    fn state(&mut self) -> Result<String, String> {
        Ok(self.current.clone())
    }

    fn set_state(&mut self, state: &str) -> Result<(), String> {
        if !self.states.iter().any(|s| s == state) {
            return Err(format!("invalid state {state}"));
        }
        self.current = state.to_string();
        Ok(())
    }
}
