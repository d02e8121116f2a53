// 基本的なデータ型と定数
pub mod common;

// 移動体・危険領域の基本インターフェース（trait）定義
pub mod traits;

// 運用エリアの構成要素
pub mod environment;
pub mod hazard;
pub mod area;

// 移動体と、それを束ねる任務・群
pub mod entity;
pub mod mission;
pub mod fleet;

// 便利な re-export
pub use common::*;
pub use traits::*;
pub use environment::{EnvironmentFields, MarineCurrent, Precipitation, PrecipitationKind, RainZone, Wind};
pub use hazard::{ExclusionZone, Obstacle};
pub use area::OperatingArea;
pub use entity::{Alert, AlertKind, EntityClass, EntityId, EntityKind, Medium, MobileEntity, Payload};
pub use mission::{CancelPolicy, Mission, MissionKind, MissionStatus};
pub use fleet::{ProximityAlert, Swarm};
