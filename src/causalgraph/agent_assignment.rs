use std::collections::BTreeMap;
use crate::{ActorId, LV};

/// Local index for an actor. These are assigned in the order actors are first seen, so they are
/// never shared between replicas.
pub type AgentIdx = usize;

#[derive(Clone, Debug)]
pub(crate) struct ClientData {
    /// The actor this entry describes.
    pub(crate) id: ActorId,

    /// The local version of each change from this actor, indexed by `seq - 1`. Sequence numbers
    /// are contiguous, so this is never sparse.
    pub(crate) changes: Vec<LV>,
}

impl ClientData {
    pub fn get_next_seq(&self) -> u64 {
        self.changes.len() as u64 + 1
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    #[inline]
    pub(crate) fn try_seq_to_lv(&self, seq: u64) -> Option<LV> {
        let idx = usize::try_from(seq.checked_sub(1)?).ok()?;
        self.changes.get(idx).copied()
    }
}

/// Maps between actor ids and the dense local indexes used by the causal graph.
#[derive(Debug, Clone, Default)]
pub struct AgentAssignment {
    /// For each actor, we store some data (above). This is indexed by AgentIdx.
    pub(crate) client_data: Vec<ClientData>,

    by_id: BTreeMap<ActorId, AgentIdx>,
}

impl AgentAssignment {
    pub fn new() -> Self { Self::default() }

    pub fn get_agent_idx(&self, actor: &ActorId) -> Option<AgentIdx> {
        self.by_id.get(actor).copied()
    }

    pub fn get_or_create_agent_idx(&mut self, actor: ActorId) -> AgentIdx {
        if let Some(idx) = self.get_agent_idx(&actor) {
            idx
        } else {
            self.client_data.push(ClientData {
                id: actor,
                changes: Vec::new(),
            });
            let idx = self.client_data.len() - 1;
            self.by_id.insert(actor, idx);
            idx
        }
    }

    pub fn get_actor(&self, agent: AgentIdx) -> ActorId {
        self.client_data[agent].id
    }

    /// The number of actors we know about.
    pub fn len(&self) -> usize {
        self.client_data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.client_data.is_empty()
    }

    /// The sequence number the next change from this actor must carry.
    pub fn next_seq_for(&self, actor: &ActorId) -> u64 {
        self.get_agent_idx(actor)
            .map(|idx| self.client_data[idx].get_next_seq())
            .unwrap_or(1)
    }

    pub fn seq_to_lv(&self, actor: &ActorId, seq: u64) -> Option<LV> {
        let idx = self.get_agent_idx(actor)?;
        self.client_data[idx].try_seq_to_lv(seq)
    }

    pub fn iter_actors(&self) -> impl Iterator<Item=&ActorId> + '_ {
        self.client_data.iter().map(|c| &c.id)
    }
}
