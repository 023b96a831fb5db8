use tracing::warn;

use super::OscMessage;

/// Anything that can receive a routed OSC message.
///
/// Routing is depth-first and first-match-wins: [`OscNode::process_osc`]
/// offers the message to every child in insertion order and only falls back
/// to the node's own [`OscNode::handle_osc`] when no child claimed it.
pub trait OscNode {
    /// Full address of this node, e.g. `/visual/intro/title`.
    fn osc_address(&self) -> &str;

    /// Replaces the stored address. Composite nodes re-root their children.
    fn set_osc_address(&mut self, address: String);

    /// Offers the message to child nodes; returns true once one claims it.
    fn dispatch_children(&mut self, _message: &OscMessage) -> bool {
        false
    }

    /// Handles messages addressed to this node itself.
    fn handle_osc(&mut self, _message: &OscMessage) -> bool {
        false
    }

    /// Routes a message through this node and its subtree.
    fn process_osc(&mut self, message: &OscMessage) -> bool {
        if self.dispatch_children(message) {
            return true;
        }
        self.handle_osc(message)
    }
}

/// Ordered list of owned child nodes.
///
/// Insertion order is routing priority and draw order. Slots vacated through
/// [`NodeList::take`] are pruned (with a warning) the next time the list is
/// walked mutably; index based accessors always count live nodes only.
pub struct NodeList<N: ?Sized> {
    label: &'static str,
    slots: Vec<Option<Box<N>>>,
}

impl<N: ?Sized> NodeList<N> {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            slots: Vec::new(),
        }
    }

    pub fn push(&mut self, node: Box<N>) {
        self.slots.push(Some(node));
    }

    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &N> + '_ {
        self.slots.iter().flatten().map(|node| &**node)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut N> + '_ {
        self.prune();
        self.slots.iter_mut().flatten().map(|node| &mut **node)
    }

    pub fn get(&self, index: usize) -> Option<&N> {
        self.iter().nth(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut N> {
        self.iter_mut().nth(index)
    }

    pub fn position(&self, mut predicate: impl FnMut(&N) -> bool) -> Option<usize> {
        self.iter().position(|node| predicate(node))
    }

    /// Removes the live node at `index`, closing the gap.
    pub fn remove(&mut self, index: usize) -> Option<Box<N>> {
        self.prune();
        if index < self.slots.len() {
            self.slots.remove(index)
        } else {
            None
        }
    }

    /// Removes the first live node matching `predicate`.
    pub fn remove_where(&mut self, predicate: impl FnMut(&N) -> bool) -> Option<Box<N>> {
        let index = self.position(predicate)?;
        self.remove(index)
    }

    /// Moves the live node at `index` out, leaving a vacated slot behind.
    pub fn take(&mut self, index: usize) -> Option<Box<N>> {
        self.slots.iter_mut().filter(|slot| slot.is_some()).nth(index)?.take()
    }

    /// Removes and returns every node in order.
    pub fn drain(&mut self) -> Vec<Box<N>> {
        self.slots.drain(..).flatten().collect()
    }

    /// Drops vacated slots, returning how many were removed.
    pub fn prune(&mut self) -> usize {
        let before = self.slots.len();
        self.slots.retain(Option::is_some);
        let removed = before - self.slots.len();
        if removed > 0 {
            warn!(list = self.label, removed, "removed empty node slots");
        }
        removed
    }
}

impl<N: ?Sized + OscNode> NodeList<N> {
    /// Offers `message` to each node in order, stopping at the first claimant.
    pub fn dispatch(&mut self, message: &OscMessage) -> bool {
        self.iter_mut().any(|node| node.process_osc(message))
    }
}

impl<N: ?Sized> Default for NodeList<N> {
    fn default() -> Self {
        Self::new("nodes")
    }
}

impl<N: ?Sized> std::fmt::Debug for NodeList<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeList")
            .field("label", &self.label)
            .field("len", &self.len())
            .field("slots", &self.slots.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    type Log = Arc<Mutex<Vec<String>>>;

    /// Test node that claims exactly its own address and records every visit.
    struct Spy {
        name: &'static str,
        address: String,
        claims: Vec<String>,
        children: NodeList<Spy>,
        log: Log,
    }

    impl Spy {
        fn new(name: &'static str, address: &str, log: &Log) -> Self {
            Self {
                name,
                address: address.to_string(),
                claims: vec![address.to_string()],
                children: NodeList::new("spies"),
                log: log.clone(),
            }
        }

        fn claiming(mut self, address: &str) -> Self {
            self.claims.push(address.to_string());
            self
        }
    }

    impl OscNode for Spy {
        fn osc_address(&self) -> &str {
            &self.address
        }

        fn set_osc_address(&mut self, address: String) {
            self.address = address;
        }

        fn dispatch_children(&mut self, message: &OscMessage) -> bool {
            self.children.dispatch(message)
        }

        fn handle_osc(&mut self, message: &OscMessage) -> bool {
            self.log.lock().unwrap().push(self.name.to_string());
            self.claims.iter().any(|claim| claim == message.address())
        }
    }

    #[test]
    fn children_are_offered_the_message_before_the_parent() {
        let log = Log::default();
        // both the parent and the child claim "/root/child"
        let mut parent = Spy::new("parent", "/root", &log).claiming("/root/child");
        parent
            .children
            .push(Box::new(Spy::new("child", "/root/child", &log)));

        assert!(parent.process_osc(&OscMessage::new("/root/child")));
        assert_eq!(*log.lock().unwrap(), vec!["child"]);
    }

    #[test]
    fn unclaimed_messages_fall_back_to_the_parent() {
        let log = Log::default();
        let mut parent = Spy::new("parent", "/root", &log);
        parent
            .children
            .push(Box::new(Spy::new("child", "/root/child", &log)));

        assert!(parent.process_osc(&OscMessage::new("/root")));
        assert_eq!(*log.lock().unwrap(), vec!["child", "parent"]);

        assert!(!parent.process_osc(&OscMessage::new("/elsewhere")));
    }

    #[test]
    fn first_claimant_stops_the_walk() {
        let log = Log::default();
        let mut list: NodeList<Spy> = NodeList::new("test");
        list.push(Box::new(Spy::new("a", "/x", &log)));
        list.push(Box::new(Spy::new("b", "/x", &log)));

        assert!(list.dispatch(&OscMessage::new("/x")));
        assert_eq!(*log.lock().unwrap(), vec!["a"]);
    }

    #[test]
    fn vacated_slots_are_pruned_without_aborting_the_walk() {
        let log = Log::default();
        let mut list: NodeList<Spy> = NodeList::new("test");
        list.push(Box::new(Spy::new("a", "/a", &log)));
        list.push(Box::new(Spy::new("b", "/b", &log)));
        list.push(Box::new(Spy::new("c", "/c", &log)));

        let taken = list.take(1).expect("b should be taken");
        assert_eq!(taken.name, "b");
        assert_eq!(list.len(), 2);
        assert_eq!(list.get(1).map(|spy| spy.name), Some("c"));

        assert!(list.dispatch(&OscMessage::new("/c")));
        assert_eq!(*log.lock().unwrap(), vec!["a", "c"]);
        assert_eq!(list.prune(), 0);
    }

    #[test]
    fn remove_counts_live_nodes_only() {
        let log = Log::default();
        let mut list: NodeList<Spy> = NodeList::new("test");
        for name in ["a", "b", "c"] {
            list.push(Box::new(Spy::new(name, "/", &log)));
        }
        list.take(0);

        let removed = list.remove(1).unwrap();
        assert_eq!(removed.name, "c");
        assert_eq!(list.iter().map(|spy| spy.name).collect::<Vec<_>>(), vec!["b"]);
    }
}
