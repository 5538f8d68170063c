use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// **DATA TYPE IDENTITY**
///
/// **PURPOSE**: Runtime identity of a Rust type flowing through data contexts.
/// **GUARANTEE**: Equality and hashing use `TypeId` only; the name is diagnostic.
#[derive(Clone, Copy)]
pub struct DataType {
    id: TypeId,
    name: &'static str,
}

impl DataType {
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name as reported by the compiler.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without its module path, e.g. `Person` for `app::model::Person`.
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        match base.rfind("::") {
            Some(idx) => &self.name[idx + 2..],
            None => self.name,
        }
    }
}

impl PartialEq for DataType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DataType {}

impl Hash for DataType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataType({})", self.short_name())
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// **DATA REQUIREMENT**
///
/// **PURPOSE**: "A type of data, optionally named". Also serves as the key under which a
/// value is stored in a data context.
/// **EQUALITY**: Type and scope name must both match; `None` is the default scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dependency {
    pub data_type: DataType,
    pub scope_name: Option<String>,
}

impl Dependency {
    pub fn new(data_type: DataType, scope_name: Option<&str>) -> Self {
        Self {
            data_type,
            scope_name: scope_name.map(str::to_string),
        }
    }

    pub fn of<T: Any>(scope_name: Option<&str>) -> Self {
        Self::new(DataType::of::<T>(), scope_name)
    }

    pub fn scope_name(&self) -> Option<&str> {
        self.scope_name.as_deref()
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope_name {
            Some(name) => write!(f, "{}@{}", self.data_type, name),
            None => write!(f, "{}", self.data_type),
        }
    }
}

/// **SCOPE MATCH RULE**
///
/// **PURPOSE**: Declared on a scope provider node to claim a class of dependencies.
/// `None` fields are wildcards; [`Scope::wildcard`] claims everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Scope {
    pub data_type: Option<DataType>,
    pub scope_name: Option<String>,
}

impl Scope {
    pub fn new(data_type: Option<DataType>, scope_name: Option<&str>) -> Self {
        Self {
            data_type,
            scope_name: scope_name.map(str::to_string),
        }
    }

    /// Catch-all scope, typically declared on the root.
    pub fn wildcard() -> Self {
        Self::default()
    }

    /// Claims every dependency on `T`, whatever its scope name.
    pub fn for_type<T: Any>() -> Self {
        Self::new(Some(DataType::of::<T>()), None)
    }

    /// Claims every dependency carrying this scope name.
    pub fn named(scope_name: &str) -> Self {
        Self::new(None, Some(scope_name))
    }

    /// Claims dependencies on `T` under exactly this scope name.
    pub fn exact<T: Any>(scope_name: &str) -> Self {
        Self::new(Some(DataType::of::<T>()), Some(scope_name))
    }

    pub fn is_wildcard(&self) -> bool {
        self.data_type.is_none() && self.scope_name.is_none()
    }

    pub fn is_match(&self, dependency: &Dependency) -> bool {
        let type_ok = self
            .data_type
            .map_or(true, |data_type| data_type == dependency.data_type);
        let name_ok = match &self.scope_name {
            None => true,
            Some(name) => dependency.scope_name.as_deref() == Some(name.as_str()),
        };
        type_ok && name_ok
    }
}
