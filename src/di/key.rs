use std::any::TypeId;
use std::fmt;

/// Type name and type id of an abstraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeInfo {
    pub type_name: &'static str,
    pub type_id: TypeId,
}

impl TypeInfo {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

/// Identity of a binding: the abstraction type plus an optional name.
///
/// An empty name is the same as no name, so `Key::named::<T>("")` and
/// `Key::of::<T>()` address the same binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    type_info: TypeInfo,
    name: Option<String>,
}

impl Key {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_info: TypeInfo::of::<T>(),
            name: None,
        }
    }

    pub fn named<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            type_info: TypeInfo::of::<T>(),
            name: (!name.is_empty()).then_some(name),
        }
    }

    pub fn type_info(&self) -> TypeInfo {
        self.type_info
    }

    pub fn type_name(&self) -> &'static str {
        self.type_info.type_name
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} (named \"{}\")", self.type_info, name),
            None => write!(f, "{}", self.type_info),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_name_is_unnamed() {
        assert_eq!(Key::named::<u32>(""), Key::of::<u32>());
        assert_ne!(Key::named::<u32>("port"), Key::of::<u32>());
    }

    #[test]
    fn test_display() {
        assert_eq!(Key::of::<String>().to_string(), "alloc::string::String");
        assert_eq!(
            Key::named::<u8>("level").to_string(),
            "u8 (named \"level\")"
        );
    }
}
