//! Domain models shared by the exploration engine and the gateway
//!
//! - `PaperId` / `PaperNode`: normalized paper identity and metadata
//! - `EdgeKind` / `Edge`: typed relationships between papers
//! - `RelationKind`: the relation types the literature search can be asked for

mod edge;
mod paper;
mod relation;

pub use edge::{Edge, EdgeKey, EdgeKind};
pub use paper::{PaperId, PaperNode};
pub use relation::{LinkDirection, RelationKind, SearchFilter};
