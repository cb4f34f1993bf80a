mod classifier;
pub mod rules;
pub mod state;

pub use classifier::{
    classify_click, classify_request, classify_spa_navigation, BlockAction, BlockCategory,
    BlockDecision,
};
pub use state::BlockingState;
