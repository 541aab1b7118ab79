//! Region addressing and read-only introspection.

use crate::core::{StateId, StateRef};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;

/// One step down the region tree: a composite state and one of its regions.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathStep {
    pub state: String,
    pub region: usize,
}

/// Address of a region inside a machine.
///
/// A path starts at one of the machine's root regions and descends through
/// composite states, naming the state and the index of its region at each
/// step. State names are unique within a region, so a path is unambiguous.
///
/// # Example
///
/// ```rust
/// use stratum::engine::RegionPath;
///
/// let path = RegionPath::region(0).then_named("on", 1);
/// assert_eq!(path.to_string(), "root[0]/on[1]");
/// assert_eq!(path.depth(), 1);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionPath {
    root: usize,
    steps: Vec<PathStep>,
}

impl RegionPath {
    /// The first root region.
    pub fn root() -> Self {
        Self::region(0)
    }

    /// Root region `index`.
    pub fn region(index: usize) -> Self {
        Self {
            root: index,
            steps: Vec::new(),
        }
    }

    /// Region `index` of `state`, inside this region.
    pub fn then<C>(&self, state: &StateRef<C>, index: usize) -> Self {
        self.then_named(state.name(), index)
    }

    pub fn then_named(&self, state: &str, index: usize) -> Self {
        let mut steps = self.steps.clone();
        steps.push(PathStep {
            state: state.to_string(),
            region: index,
        });
        Self {
            root: self.root,
            steps,
        }
    }

    pub fn root_index(&self) -> usize {
        self.root
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    /// Number of composite states between the root and this region.
    pub fn depth(&self) -> usize {
        self.steps.len()
    }
}

impl Default for RegionPath {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Display for RegionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "root[{}]", self.root)?;
        for step in &self.steps {
            write!(f, "/{}[{}]", step.state, step.region)?;
        }
        Ok(())
    }
}

/// Read-only view of a region, whatever its context type.
pub trait RegionView {
    fn path(&self) -> &RegionPath;

    fn is_running(&self) -> bool;

    /// Identity of the active state, `None` when stopped.
    fn active_state(&self) -> Option<StateId>;

    fn active_state_name(&self) -> Option<&str>;

    /// Index of the active state in the region's state list.
    fn active_state_index(&self) -> Option<usize>;

    /// Names of the region's states, in index order.
    fn state_names(&self) -> Vec<&str>;

    /// Region `index` of the composite state named `state`.
    fn child_region(&self, state: &str, index: usize) -> Option<&dyn RegionView>;

    /// Every region owned by the region's composite states.
    fn children(&self) -> Vec<&dyn RegionView>;

    fn state(&self, id: StateId) -> Option<StateView<'_>>;
}

/// Read-only view of one state instance.
pub struct StateView<'a> {
    pub(crate) id: StateId,
    pub(crate) name: &'a str,
    pub(crate) active: bool,
    pub(crate) regions: Vec<&'a dyn RegionView>,
    pub(crate) context: Option<&'a dyn Any>,
}

impl<'a> StateView<'a> {
    pub fn id(&self) -> StateId {
        self.id
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn regions(&self) -> &[&'a dyn RegionView] {
        &self.regions
    }

    /// Context of a submachine state that owns one.
    pub fn context<D: Any>(&self) -> Option<&'a D> {
        self.context.and_then(|context| context.downcast_ref::<D>())
    }
}

impl fmt::Debug for StateView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateView")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("active", &self.active)
            .field("regions", &self.regions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StateConf;

    #[test]
    fn display_lists_every_step() {
        let on = StateConf::<()>::new("on").build();
        let path = RegionPath::region(1).then(&on, 0).then_named("blink", 2);

        assert_eq!(path.to_string(), "root[1]/on[0]/blink[2]");
        assert_eq!(path.root_index(), 1);
        assert_eq!(path.depth(), 2);
    }

    #[test]
    fn then_leaves_parent_untouched() {
        let parent = RegionPath::root();
        let child = parent.then_named("on", 0);

        assert_eq!(parent.depth(), 0);
        assert_ne!(parent, child);
    }

    #[test]
    fn path_serializes_correctly() {
        let path = RegionPath::region(0).then_named("on", 1);

        let json = serde_json::to_string(&path).unwrap();
        let deserialized: RegionPath = serde_json::from_str(&json).unwrap();

        assert_eq!(path, deserialized);
    }
}
