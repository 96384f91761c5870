use crate::error::{AppError, Result};

/// 外部身份ID的最大长度
const MAX_EXTERNAL_UID_LENGTH: usize = 128;

/// 校验外部身份ID（如 Firebase UID），返回去除空白后的值
pub fn require_external_uid(external_uid: Option<&str>) -> Result<&str> {
    let uid = external_uid
        .map(str::trim)
        .filter(|uid| !uid.is_empty())
        .ok_or_else(|| AppError::BadRequest("External UID is required".to_string()))?;

    if uid.len() > MAX_EXTERNAL_UID_LENGTH {
        return Err(AppError::Validation("External UID is too long".to_string()));
    }

    if uid.chars().any(|c| c.is_whitespace() || c == '/') {
        return Err(AppError::Validation(
            "External UID must not contain whitespace or '/'".to_string(),
        ));
    }

    Ok(uid)
}

/// 完善资料时的必填字段：name、headline、bio
pub fn validate_required_profile_fields<'a>(
    name: Option<&'a str>,
    headline: Option<&'a str>,
    bio: Option<&'a str>,
) -> Result<(&'a str, &'a str, &'a str)> {
    let present = |value: Option<&'a str>| value.filter(|v| !v.trim().is_empty());

    match (present(name), present(headline), present(bio)) {
        (Some(name), Some(headline), Some(bio)) => Ok((name, headline, bio)),
        _ => Err(AppError::BadRequest(
            "Required fields: name, headline, and bio".to_string(),
        )),
    }
}
