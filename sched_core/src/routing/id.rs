use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a routing object: the agent that created it plus that agent's
/// running index.
///
/// Ordered by agent ID, then by index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoutingObjectId {
    pub agent_id: String,
    pub index: usize,
}

impl RoutingObjectId {
    pub fn new(agent_id: impl Into<String>, index: usize) -> Self {
        Self {
            agent_id: agent_id.into(),
            index,
        }
    }
}

impl fmt::Display for RoutingObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ro_ID('{}',{})", self.agent_id, self.index)
    }
}
