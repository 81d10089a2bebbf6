use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScannerError {
    #[error("API 请求失败: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("JSON 解析错误: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("无效的响应数据: {0}")]
    InvalidResponse(String),

    #[error("会话令牌已失效 (HTTP {0})")]
    Unauthorized(u16),

    #[error("获取会话令牌失败: {0}")]
    TokenUnavailable(String),

    #[error("配置错误: {0}")]
    ConfigError(String),

    #[error("重试 {attempts} 次后仍然失败: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<ScannerError>,
    },
}

impl ScannerError {
    /// 进程退出码：配置错误 2，令牌获取失败 3，其他 1
    pub fn exit_code(&self) -> i32 {
        match self {
            ScannerError::ConfigError(_) => 2,
            ScannerError::TokenUnavailable(_) => 3,
            _ => 1,
        }
    }

    /// 是否需要重新获取会话令牌
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ScannerError::Unauthorized(_))
    }
}

pub type Result<T> = std::result::Result<T, ScannerError>;
