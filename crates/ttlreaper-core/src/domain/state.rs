//! State - 1 サイクルの状態
//!
//! # 状態遷移
//! - LoadingConfig -> (type ごとに Scanning -> Evaluating -> Deleting) -> Done
//! - LoadingConfig -> Aborted（設定の取得・デコードに失敗）
//! - 任意の状態 -> Cancelled（呼び出し側がキャンセル）

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    LoadingConfig,
    Scanning,
    Evaluating,
    Deleting,
    Done,
    Aborted,
    Cancelled,
}

impl CycleState {
    /// Is this a terminal state (next trigger starts a fresh cycle)?
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CycleState::Done | CycleState::Aborted | CycleState::Cancelled
        )
    }
}
