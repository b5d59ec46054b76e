//! 日志脱敏辅助
//!
//! RPC 错误消息可能回显原始交易或十六进制载荷，
//! 进入日志/错误消息之前统一经过这里截断。

/// 截断可能包含敏感载荷的字符串，只保留前缀便于排查
///
/// 输入可能是任意 UTF-8（节点错误文本常含全角字符），
/// 截断点回退到不超过预算的字符边界，绝不在多字节字符中间切开。
pub fn truncate_payload(s: &str) -> String {
    const KEEP: usize = 24;
    if s.len() <= KEEP {
        return s.to_string();
    }
    let mut cut = KEEP;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...({} bytes)", &s[..cut], s.len())
}

/// 遮蔽长十六进制串（保留首尾各4字符）
pub fn mask_hex(s: &str) -> String {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    if stripped.len() <= 8 || !stripped.chars().all(|c| c.is_ascii_hexdigit()) {
        return s.to_string();
    }
    format!(
        "{}…{}",
        &stripped[..4],
        &stripped[stripped.len() - 4..]
    )
}
