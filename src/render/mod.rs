//! Grid layout, per-channel painting and frame compositing.

pub mod frame;
pub mod layout;
pub mod paint;
pub mod preview;
pub mod scope_renderer;
pub mod text;

pub use frame::FrameRGBA;
pub use layout::{ChannelStyle, GridLayout, PaintInfo};
pub use preview::PreviewRenderer;
pub use scope_renderer::{BaseRenderer, Player, ScopeRenderer};
pub use text::LabelTypesetter;
