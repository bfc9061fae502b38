pub mod analysis;
mod analysis_thread;
pub mod block;
pub mod capture;
pub mod cipher;
pub mod config;
pub mod diff;
pub mod error;
pub mod simulation;

pub mod prelude {
    pub use crate::analysis::{
        recover_aes_key, recover_des_key, recover_initial_des_key, recover_round_key,
        Recovery, RecoveryStats, RoundKey,
    };
    pub use crate::block::{AesBlock, Block, CipherKind, DesBlock};
    pub use crate::capture::{load_blocks, parse_blocks};
    pub use crate::error::DfaError;
    pub use crate::simulation::{faults::*, FaultCampaign};
}
