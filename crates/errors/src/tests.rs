#[cfg(test)]
mod error_tests {
    use crate::*;

    #[test]
    fn test_scheduler_error_display() {
        let state_error = SchedulerError::InvalidState("模拟运行中".to_string());
        assert_eq!(state_error.to_string(), "无效状态: 模拟运行中");

        let validation_error = SchedulerError::ValidationError("duration is zero".to_string());
        assert_eq!(validation_error.to_string(), "数据验证失败: duration is zero");

        let config_error = SchedulerError::Configuration("Missing required field".to_string());
        assert_eq!(config_error.to_string(), "配置错误: Missing required field");

        let exec_error = SchedulerError::TaskExecution {
            id: 7,
            message: "worker panicked".to_string(),
        };
        assert_eq!(exec_error.to_string(), "任务 7 执行错误: worker panicked");

        let task_error = SchedulerError::TaskNotFound { id: 123 };
        assert_eq!(task_error.to_string(), "任务未找到: 123");

        let internal_error = SchedulerError::Internal("Unexpected error".to_string());
        assert_eq!(internal_error.to_string(), "内部错误: Unexpected error");
    }

    #[test]
    fn test_scheduler_error_creation_methods() {
        let error = SchedulerError::invalid_state("running");
        assert!(matches!(error, SchedulerError::InvalidState(ref msg) if msg == "running"));

        let error = SchedulerError::validation_error("bad input");
        assert!(matches!(error, SchedulerError::ValidationError(ref msg) if msg == "bad input"));

        let error = SchedulerError::config_error("bad config");
        assert!(matches!(error, SchedulerError::Configuration(ref msg) if msg == "bad config"));

        let error = SchedulerError::task_not_found(9);
        assert!(matches!(error, SchedulerError::TaskNotFound { id: 9 }));

        let error = SchedulerError::task_execution(3, "aborted");
        assert!(matches!(error, SchedulerError::TaskExecution { id: 3, .. }));
    }

    #[test]
    fn test_is_invalid_state() {
        assert!(SchedulerError::invalid_state("x").is_invalid_state());
        assert!(!SchedulerError::validation_error("x").is_invalid_state());
        assert!(!SchedulerError::Internal("x".to_string()).is_invalid_state());
    }

    #[test]
    fn test_is_fatal() {
        assert!(SchedulerError::Internal("x".to_string()).is_fatal());
        assert!(SchedulerError::config_error("x").is_fatal());
        assert!(!SchedulerError::invalid_state("x").is_fatal());
        assert!(!SchedulerError::task_execution(1, "x").is_fatal());
    }

    #[test]
    fn test_user_message() {
        assert_eq!(
            SchedulerError::invalid_state("x").user_message(),
            "当前状态不允许执行此操作"
        );
        assert_eq!(
            SchedulerError::validation_error("x").user_message(),
            "输入数据验证失败"
        );
        assert_eq!(
            SchedulerError::Internal("x".to_string()).user_message(),
            "系统繁忙，请稍后重试"
        );
    }

    #[test]
    fn test_error_conversions() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid").unwrap_err();
        let error: SchedulerError = json_err.into();
        assert!(matches!(error, SchedulerError::Serialization(_)));

        let error: SchedulerError = anyhow::anyhow!("boom").into();
        assert!(matches!(error, SchedulerError::Internal(ref msg) if msg == "boom"));
    }
}
