//! Buffer bookkeeping for element types with real construction and
//! destruction.
//!
//! The host runtime allocates array buffers as raw bytes and never runs
//! element constructors or destructors. This crate closes that gap:
//!
//! - [`MemoryRegistry`] records every live buffer by start address and,
//!   once an element is constructed in place, which slots hold live
//!   elements.
//! - [`Adapter`] implements the host's four allocator hooks over a
//!   [`RawAllocator`], registering buffers on allocation and destroying
//!   flagged slots before releasing memory.
//! - [`construct_at`] is how element stores flag their slot.
//! - [`QUADDT_MEM_HANDLER`] packages the process-wide adapter as a host
//!   memory handler; [`install_mem_handler`] installs it.
//!
//! # Lifetime
//!
//! The global registry is a static: it exists before the first
//! allocation and is never torn down, so it outlives every buffer it
//! tracks.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod element;
pub mod hooks;
pub mod raw;
pub mod registry;
pub mod slot;

pub use element::ElementVTable;
pub use hooks::{global_adapter, install_mem_handler, Adapter, HANDLER_NAME, QUADDT_MEM_HANDLER};
pub use raw::{LibcAllocator, RawAllocator};
pub use registry::{BufferInfo, MemoryRegistry, RegistryStats};
pub use slot::{construct_at, mark_written};
