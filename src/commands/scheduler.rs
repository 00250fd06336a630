//! Script ordering by declared requirements.
//!
//! A stable depth-first placement: scripts are walked in document order and
//! each one is emitted after its (transitive) prerequisites, which are
//! visited in requirement-declaration order. Independent scripts keep their
//! relative order.
use std::collections::HashMap;

use serde::Deserialize;

use crate::error::ScheduleError;
use crate::tasks::Script;

/// What to do with a requirement that names no known script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownRequirementPolicy {
    /// Skip the requirement.
    #[default]
    Ignore,
    /// Fail with [`ScheduleError::UnknownRequirement`].
    Error,
}

/// What to do when a requirement leads back to a script being placed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CyclePolicy {
    /// Fail with [`ScheduleError::Cycle`].
    #[default]
    Error,
    /// Drop the back edge and keep placing.
    Ignore,
}

/// Scheduler policies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulePolicy {
    /// Unknown requirement handling.
    pub unknown_requirements: UnknownRequirementPolicy,
    /// Cycle handling.
    pub cycles: CyclePolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Placed,
}

struct Walk<'a> {
    ids: &'a [String],
    requirements: &'a [Vec<String>],
    index: HashMap<&'a str, usize>,
    marks: Vec<Mark>,
    stack: Vec<usize>,
    placed: Vec<usize>,
    policy: SchedulePolicy,
}

impl<'a> Walk<'a> {
    fn new(ids: &'a [String], requirements: &'a [Vec<String>], policy: SchedulePolicy) -> Self {
        let mut index = HashMap::with_capacity(ids.len());
        for (i, id) in ids.iter().enumerate() {
            index.entry(id.as_str()).or_insert(i);
        }
        Self {
            ids,
            requirements,
            index,
            marks: vec![Mark::Unvisited; ids.len()],
            stack: Vec::new(),
            placed: Vec::with_capacity(ids.len()),
            policy,
        }
    }

    fn id(&self, idx: usize) -> String {
        self.ids.get(idx).cloned().unwrap_or_default()
    }

    fn set_mark(&mut self, idx: usize, mark: Mark) {
        if let Some(m) = self.marks.get_mut(idx) {
            *m = mark;
        }
    }

    fn cycle_through(&self, target: usize) -> Vec<String> {
        let start = self
            .stack
            .iter()
            .position(|&i| i == target)
            .unwrap_or_default();
        self.stack
            .iter()
            .skip(start)
            .chain(std::iter::once(&target))
            .map(|&i| self.id(i))
            .collect()
    }

    fn visit(&mut self, idx: usize) -> Result<(), ScheduleError> {
        self.set_mark(idx, Mark::InProgress);
        self.stack.push(idx);

        let all = self.requirements;
        let requirements = all.get(idx).map_or(&[][..], Vec::as_slice);
        for requirement in requirements {
            let Some(&target) = self.index.get(requirement.as_str()) else {
                match self.policy.unknown_requirements {
                    UnknownRequirementPolicy::Ignore => {
                        tracing::debug!(
                            "script '{}' requires unknown script '{requirement}', ignoring",
                            self.id(idx)
                        );
                        continue;
                    }
                    UnknownRequirementPolicy::Error => {
                        return Err(ScheduleError::UnknownRequirement {
                            script: self.id(idx),
                            requirement: requirement.clone(),
                        });
                    }
                }
            };
            match self.marks.get(target) {
                Some(Mark::Unvisited) => self.visit(target)?,
                Some(Mark::InProgress) => match self.policy.cycles {
                    CyclePolicy::Error => {
                        return Err(ScheduleError::Cycle(self.cycle_through(target)));
                    }
                    CyclePolicy::Ignore => tracing::warn!(
                        "ignoring requirement cycle: {}",
                        self.cycle_through(target).join(" -> ")
                    ),
                },
                Some(Mark::Placed) | None => {}
            }
        }

        self.stack.pop();
        self.set_mark(idx, Mark::Placed);
        self.placed.push(idx);
        Ok(())
    }
}

/// Reorder `scripts` so every script follows the scripts it requires.
///
/// No script is added or dropped and task order inside a script is kept.
///
/// # Errors
///
/// Returns [`ScheduleError`] when a policy set to `error` is violated.
pub fn order(scripts: Vec<Script>, policy: SchedulePolicy) -> Result<Vec<Script>, ScheduleError> {
    let ids: Vec<String> = scripts.iter().map(|s| s.id.clone()).collect();
    let requirements: Vec<Vec<String>> = scripts
        .iter()
        .map(|s| s.requirements().map(str::to_string).collect())
        .collect();

    let mut walk = Walk::new(&ids, &requirements, policy);
    for idx in 0..ids.len() {
        if walk.marks.get(idx) == Some(&Mark::Unvisited) {
            walk.visit(idx)?;
        }
    }

    let mut slots: Vec<Option<Script>> = scripts.into_iter().map(Some).collect();
    Ok(walk
        .placed
        .iter()
        .filter_map(|&i| slots.get_mut(i).and_then(Option::take))
        .collect())
}
