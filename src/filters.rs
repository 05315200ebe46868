use heck::{ToKebabCase, ToLowerCamelCase, ToPascalCase, ToShoutySnakeCase, ToSnakeCase};
use minijinja::value::Value;
use minijinja::{Error, ErrorKind};

pub fn camelcase(s: String) -> String {
    s.to_lower_camel_case()
}

pub fn pascalcase(s: String) -> String {
    s.to_pascal_case()
}

pub fn snakecase(s: String) -> String {
    s.to_snake_case()
}

pub fn kebabcase(s: String) -> String {
    s.to_kebab_case()
}

pub fn screamingsnakecase(s: String) -> String {
    s.to_shouty_snake_case()
}

/// Strict mapping lookup exposed to templates as `lookup(map, key)`.
///
/// A missing key is an error so template authors have to handle absence
/// explicitly instead of silently emitting an empty value.
pub fn lookup(map: Value, key: String) -> Result<Value, Error> {
    match map.get_attr(&key) {
        Ok(val) if !val.is_undefined() => Ok(val),
        _ => Err(Error::new(
            ErrorKind::InvalidOperation,
            format!("missing key {key}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_conversions() {
        assert_eq!(camelcase("my value".to_string()), "myValue");
        assert_eq!(pascalcase("my value".to_string()), "MyValue");
        assert_eq!(snakecase("MyValue".to_string()), "my_value");
        assert_eq!(kebabcase("MyValue".to_string()), "my-value");
        assert_eq!(screamingsnakecase("my value".to_string()), "MY_VALUE");
    }

    #[test]
    fn test_lookup() {
        let map = Value::from_serialize(std::collections::HashMap::from([("key", "value")]));
        assert_eq!(lookup(map.clone(), "key".to_string()).unwrap(), Value::from("value"));
        assert!(lookup(map, "other".to_string()).is_err());
    }
}
