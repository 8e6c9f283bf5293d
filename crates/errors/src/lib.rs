use thiserror::Error;

/// 调度模拟器错误类型定义
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("无效状态: {0}")]
    InvalidState(String),
    #[error("数据验证失败: {0}")]
    ValidationError(String),
    #[error("任务未找到: {id}")]
    TaskNotFound { id: u64 },
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("任务 {id} 执行错误: {message}")]
    TaskExecution { id: u64, message: String },
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

impl SchedulerError {
    pub fn invalid_state<S: Into<String>>(msg: S) -> Self {
        Self::InvalidState(msg.into())
    }
    pub fn validation_error<S: Into<String>>(msg: S) -> Self {
        Self::ValidationError(msg.into())
    }
    pub fn task_not_found(id: u64) -> Self {
        Self::TaskNotFound { id }
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn task_execution<S: Into<String>>(id: u64, msg: S) -> Self {
        Self::TaskExecution {
            id,
            message: msg.into(),
        }
    }
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, SchedulerError::InvalidState(_))
    }
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SchedulerError::Internal(_) | SchedulerError::Configuration(_)
        )
    }
    pub fn user_message(&self) -> &str {
        match self {
            SchedulerError::InvalidState(_) => "当前状态不允许执行此操作",
            SchedulerError::ValidationError(_) => "输入数据验证失败",
            SchedulerError::TaskNotFound { .. } => "请求的任务不存在",
            SchedulerError::Configuration(_) => "配置有误，请检查配置文件",
            SchedulerError::TaskExecution { .. } => "任务执行失败",
            _ => "系统繁忙，请稍后重试",
        }
    }
}

impl From<serde_json::Error> for SchedulerError {
    fn from(err: serde_json::Error) -> Self {
        SchedulerError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for SchedulerError {
    fn from(err: anyhow::Error) -> Self {
        SchedulerError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests;
