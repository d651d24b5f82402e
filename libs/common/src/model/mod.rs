//! Session-state models shared by adapters, the watcher and the node

pub mod qrcode;
pub mod session;

// Re-export for convenience
pub use qrcode::{QrCode, QrCodeState};
pub use session::{Session, TokenSign};
