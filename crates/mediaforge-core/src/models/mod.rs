pub mod asset;
pub mod batch;
pub mod owner;
pub mod policy;
pub mod sizes;

pub use asset::{AssetAttrs, AssetKey, DuplicateGroup, MediaAsset};
pub use batch::{BatchProgress, UnitOutcome, UnitSummary};
pub use owner::{FieldChanged, FieldValue, MediaOwner, OwnerRegistry, OwnerResolver};
pub use policy::{
    compression_ratio_percent, CompressionPolicy, OutputFormat, ResizeMode, VideoContainer,
    VideoPolicy,
};
pub use sizes::{SizeAxis, SizeSpec, SizeSpecSet};
