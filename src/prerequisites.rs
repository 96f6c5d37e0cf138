//! Prerequisite DAG: cycle detection on edit and direct satisfaction checks.
//!
//! The graph is a snapshot of `course -> required course` edges. Validation runs
//! against the candidate edge set so a rejected edit never touches the snapshot.
use std::collections::{BTreeMap, BTreeSet, btree_set};

use crate::error::{EnrollmentError, Result};
use crate::types::CourseId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrerequisiteGraph {
    edges: BTreeMap<CourseId, BTreeSet<CourseId>>,
}

impl PrerequisiteGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_edges<I>(edges: I) -> Self
    where
        I: IntoIterator<Item = (CourseId, BTreeSet<CourseId>)>,
    {
        Self {
            edges: edges
                .into_iter()
                .filter(|(_, required)| !required.is_empty())
                .collect(),
        }
    }

    pub fn requirements(&self, course_id: &str) -> Option<&BTreeSet<CourseId>> {
        self.edges.get(course_id)
    }

    pub fn edges(&self) -> impl Iterator<Item = (&CourseId, &BTreeSet<CourseId>)> {
        self.edges.iter()
    }

    /// Validates the candidate edge set for `course_id` and, if acyclic, commits it.
    pub fn set_prerequisites(
        &mut self,
        course_id: &str,
        required: BTreeSet<CourseId>,
    ) -> Result<()> {
        self.check_candidate(course_id, &required)?;
        if required.is_empty() {
            self.edges.remove(course_id);
        } else {
            self.edges.insert(course_id.to_string(), required);
        }
        Ok(())
    }

    /// Fails with `CycleDetected` if `course_id` becomes reachable from itself
    /// once its edges are replaced by `required`.
    fn check_candidate(&self, course_id: &str, required: &BTreeSet<CourseId>) -> Result<()> {
        // Reaching `course_id` again is the cycle, so its old edges are never walked.
        let mut visited = BTreeSet::new();
        for next in required {
            if let Some(mut tail) = self.path_to(next, course_id, &mut visited) {
                let mut path = vec![course_id.to_string()];
                path.append(&mut tail);
                return Err(EnrollmentError::CycleDetected { path });
            }
        }
        Ok(())
    }

    fn children(&self, node: &str) -> btree_set::Iter<'_, CourseId> {
        static NONE: BTreeSet<CourseId> = BTreeSet::new();
        self.edges.get(node).unwrap_or(&NONE).iter()
    }

    /// Depth-first search from `start` with an explicit stack, so chain depth is
    /// bounded by the heap rather than the thread's stack.
    fn path_to<'a>(
        &'a self,
        start: &'a str,
        target: &str,
        visited: &mut BTreeSet<CourseId>,
    ) -> Option<Vec<CourseId>> {
        if start == target {
            return Some(vec![start.to_string()]);
        }
        if !visited.insert(start.to_string()) {
            return None;
        }

        let mut frames = vec![(start, self.children(start))];
        while let Some((_, children)) = frames.last_mut() {
            match children.next() {
                Some(child) if child == target => {
                    let mut path: Vec<CourseId> =
                        frames.iter().map(|(node, _)| node.to_string()).collect();
                    path.push(child.clone());
                    return Some(path);
                }
                Some(child) => {
                    if visited.insert(child.clone()) {
                        frames.push((child.as_str(), self.children(child)));
                    }
                }
                None => {
                    frames.pop();
                }
            }
        }
        None
    }

    /// True if the committed edge set contains no cycle.
    pub fn is_acyclic(&self) -> bool {
        // Kahn's algorithm over the committed edges.
        let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
        for (course, required) in &self.edges {
            in_degree.entry(course.as_str()).or_insert(0);
            for dep in required {
                *in_degree.entry(dep.as_str()).or_insert(0) += 1;
            }
        }

        let mut ready: Vec<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(course, _)| *course)
            .collect();
        let mut removed = 0;
        while let Some(course) = ready.pop() {
            removed += 1;
            if let Some(required) = self.edges.get(course) {
                for dep in required {
                    if let Some(degree) = in_degree.get_mut(dep.as_str()) {
                        *degree -= 1;
                        if *degree == 0 {
                            ready.push(dep.as_str());
                        }
                    }
                }
            }
        }
        removed == in_degree.len()
    }
}

/// Direct prerequisites of a course that the student has not completed, in id order.
///
/// Satisfaction is one hop: a prerequisite's own prerequisites are not re-checked.
pub fn unmet_prerequisites<F>(
    required: &BTreeSet<CourseId>,
    mut has_completed: F,
) -> Result<Vec<CourseId>>
where
    F: FnMut(&str) -> Result<bool>,
{
    let mut missing = Vec::new();
    for course in required {
        if !has_completed(course)? {
            missing.push(course.clone());
        }
    }
    Ok(missing)
}
