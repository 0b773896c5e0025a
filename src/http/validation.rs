//! Request validation, applied before anything reaches the engine.
//! Each function returns either the validated value or the full list of
//! field errors, so clients see every problem at once.

pub const CONTENT_MIN_CHARS: usize = 200;
pub const CONTENT_MAX_CHARS: usize = 10_000;
pub const TAGS_MIN_CHARS: usize = 1;
pub const TAGS_MAX_CHARS: usize = 15;
pub const IMAGE_MIN_CHARS: usize = 3;
pub const IMAGE_MAX_CHARS: usize = 100;
pub const USERNAME_MAX_CHARS: usize = 12;
pub const PASSWORD_MIN_CHARS: usize = 8;
pub const PASSWORD_MAX_CHARS: usize = 128;
pub const COMMENT_MAX_CHARS: usize = 1_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

fn check_chars(
    errors: &mut Vec<FieldError>,
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) {
    let chars = value.chars().count();
    if chars < min {
        errors.push(FieldError::new(
            field,
            format!("must be at least {min} characters"),
        ));
    } else if chars > max {
        errors.push(FieldError::new(
            field,
            format!("must be at most {max} characters"),
        ));
    }
}

pub fn validate_new_post(
    content: &str,
    tags: &str,
    image: &str,
) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();
    check_chars(&mut errors, "content", content, CONTENT_MIN_CHARS, CONTENT_MAX_CHARS);
    check_chars(&mut errors, "tags", tags, TAGS_MIN_CHARS, TAGS_MAX_CHARS);
    check_chars(&mut errors, "image", image, IMAGE_MIN_CHARS, IMAGE_MAX_CHARS);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Same bounds as creation, applied only to the fields present.
pub fn validate_post_patch(
    content: Option<&str>,
    tags: Option<&str>,
    image: Option<&str>,
) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();
    if let Some(content) = content {
        check_chars(&mut errors, "content", content, CONTENT_MIN_CHARS, CONTENT_MAX_CHARS);
    }
    if let Some(tags) = tags {
        check_chars(&mut errors, "tags", tags, TAGS_MIN_CHARS, TAGS_MAX_CHARS);
    }
    if let Some(image) = image {
        check_chars(&mut errors, "image", image, IMAGE_MIN_CHARS, IMAGE_MAX_CHARS);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub fn validate_registration(
    username: &str,
    email: &str,
    password: &str,
) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();
    check_chars(&mut errors, "username", username, 1, USERNAME_MAX_CHARS);
    if !email.contains('@') || email.chars().count() > 255 {
        errors.push(FieldError::new("email", "must be a valid email address"));
    }
    check_chars(&mut errors, "password", password, PASSWORD_MIN_CHARS, PASSWORD_MAX_CHARS);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub fn validate_comment(content: &str) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();
    if content.is_empty() {
        errors.push(FieldError::new("content", "must not be empty"));
    }
    check_chars(&mut errors, "content", content, 0, COMMENT_MAX_CHARS);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// `limit` and `page` must be positive when provided.
pub fn validate_list_params(
    limit: Option<i64>,
    page: Option<i64>,
) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();
    if let Some(limit) = limit {
        if limit <= 0 {
            errors.push(FieldError::new("limit", "must be a positive number"));
        }
    }
    if let Some(page) = page {
        if page <= 0 {
            errors.push(FieldError::new("page", "must be a positive number"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
