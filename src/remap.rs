use thiserror::Error;

/// Native expression delimiters of the template engine.
pub const NATIVE_BEGIN: &str = "{{";
pub const NATIVE_END: &str = "}}";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TagError {
    #[error("tag string must have at least 2 characters for each of the begin and end tags, '{0}' is too small")]
    TooSmall(String),
    #[error("tag string must define begin and end tags of the same size, got length {0}")]
    NotDivisible(usize),
    #[error("tag string '{tag}' must define different begin/end tags, got begin='{begin}' vs end='{end}'")]
    BeginEndEqual {
        tag: String,
        begin: String,
        end: String,
    },
    #[error("tag '{0}' cannot equal the native '{{{{' or '}}}}' delimiter")]
    NativeDelimiter(String),
}

/// Rewrites a template body so a caller-chosen delimiter pair becomes the
/// live expression syntax while literal occurrences of the native delimiters
/// survive rendering as plain text.
///
/// `tag` holds the begin and end tags concatenated, each of the same size.
/// Ex: "(())" gives begin="((" and end="))". With that tag, `(( name ))` in
/// the body is rendered as an expression and a literal `{{ x }}` is emitted
/// verbatim. An empty `tag` leaves the body untouched and the native
/// delimiters behave normally.
pub fn remap(body: &str, tag: &str) -> Result<String, TagError> {
    let mut data = if tag.is_empty() {
        body.to_string()
    } else {
        let (begin, end) = validate_tag(tag)?;

        // Order matters: the native delimiters are escaped first, wrapped in
        // the custom tags, then the custom tags become the live delimiters.
        // The escaped forms inserted in the first two passes contain no
        // native delimiter left for the later passes to touch.
        let substitutions = [
            (NATIVE_END, format!("{begin}\"{NATIVE_END}\"{end}")),
            (NATIVE_BEGIN, format!("{begin}\"{NATIVE_BEGIN}\"{end}")),
            (begin, NATIVE_BEGIN.to_string()),
            (end, NATIVE_END.to_string()),
        ];
        let mut data = body.to_string();
        for (from, to) in &substitutions {
            data = data.replace(from, to);
        }
        data
    };

    // Cosmetic aid for template authors: a backslash-newline right after an
    // end delimiter is trimmed away.
    data = data.replace("}}\\\n", "}}");
    Ok(data)
}

fn validate_tag(tag: &str) -> Result<(&str, &str), TagError> {
    if tag.len() < 4 {
        return Err(TagError::TooSmall(tag.to_string()));
    }
    if tag.len() % 2 != 0 {
        return Err(TagError::NotDivisible(tag.len()));
    }
    // The split point is a byte index; a midpoint inside a multibyte
    // character means the halves cannot be of equal size.
    let mid = tag.len() / 2;
    if !tag.is_char_boundary(mid) {
        return Err(TagError::NotDivisible(tag.len()));
    }
    let (begin, end) = tag.split_at(mid);
    if begin == end {
        return Err(TagError::BeginEndEqual {
            tag: tag.to_string(),
            begin: begin.to_string(),
            end: end.to_string(),
        });
    }
    for half in [begin, end] {
        if half == NATIVE_BEGIN || half == NATIVE_END {
            return Err(TagError::NativeDelimiter(half.to_string()));
        }
    }
    Ok((begin, end))
}
