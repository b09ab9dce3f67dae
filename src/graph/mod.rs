//! The block graph: nodes, sockets, links, and the workspace owning them.

mod node;
mod workspace;

pub use node::{FieldValue, Node, NodeId, Socket, SocketRole};
pub use workspace::{structural_eq, Workspace, WorkspaceSnapshot};
