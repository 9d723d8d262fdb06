//! Host backend facade.
//!
//! The runtime never touches a concrete node tree directly. All primitive
//! node operations go through [`HostBackend`], injected at patch-function
//! construction time. Nodes are addressed by opaque [`NodeId`] handles,
//! arena style.

pub mod memory;

pub use memory::MemoryBackend;

use std::cell::RefCell;
use std::rc::Rc;

/// Opaque handle to a host node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u64);

/// Shared handle to the injected backend.
pub type SharedBackend = Rc<RefCell<dyn HostBackend>>;

/// Primitive node operations the patcher issues.
///
/// The attribute pair at the bottom is the surface the reference `attrs`
/// module drives; backends that only host text trees may implement them as
/// no-ops.
pub trait HostBackend {
    fn create_element(&mut self, tag: &str) -> NodeId;
    fn create_element_ns(&mut self, ns: &str, tag: &str) -> NodeId;
    fn create_text_node(&mut self, text: &str) -> NodeId;
    fn create_comment(&mut self, text: &str) -> NodeId;
    fn insert_before(&mut self, parent: NodeId, node: NodeId, reference: Option<NodeId>);
    fn append_child(&mut self, parent: NodeId, child: NodeId);
    fn remove_child(&mut self, parent: NodeId, child: NodeId);
    fn parent_node(&self, node: NodeId) -> Option<NodeId>;
    fn next_sibling(&self, node: NodeId) -> Option<NodeId>;
    fn tag_name(&self, node: NodeId) -> String;
    fn set_text_content(&mut self, node: NodeId, text: &str);
    fn set_style_scope(&mut self, node: NodeId, scope_id: &str);
    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str);
    fn remove_attribute(&mut self, node: NodeId, name: &str);
}
