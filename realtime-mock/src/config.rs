/// Mock server configuration
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | MOCK_BIND_ADDR | 127.0.0.1:4000 | 监听地址 |
/// | MOCK_TOKENS | dev-token:dev-user | 逗号分隔的 `token:user_id` 列表 |
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub bind_addr: String,
    /// `(token, user_id)` pairs accepted by `/profile` and `/socket`
    pub tokens: Vec<(String, String)>,
}

impl MockConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("MOCK_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:4000".into()),
            tokens: std::env::var("MOCK_TOKENS")
                .map(|v| parse_tokens(&v))
                .unwrap_or_else(|_| vec![("dev-token".into(), "dev-user".into())]),
        }
    }
}

/// `"a:u1, b:u2"` -> `[(a, u1), (b, u2)]`; malformed entries are skipped
fn parse_tokens(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|pair| {
            let (token, user) = pair.trim().split_once(':')?;
            let (token, user) = (token.trim(), user.trim());
            (!token.is_empty() && !user.is_empty()).then(|| (token.to_string(), user.to_string()))
        })
        .collect()
}
