// Declared type model: generic types and class descriptors

use indexmap::IndexMap;
use std::fmt;

/// A declared type as it appears on a property, field or supertype.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GenericType {
    /// A plain (raw) class such as `String` or `Person`.
    Class(String),
    /// `raw<args...>`, e.g. `Map<String, List<Integer>>`.
    Parameterized { raw: String, args: Vec<GenericType> },
    /// A type parameter `name` declared by class `declared_by`.
    Variable { name: String, declared_by: String },
    /// `?`, `? extends upper`, `? super lower`.
    Wildcard {
        upper: Vec<GenericType>,
        lower: Vec<GenericType>,
    },
    /// `component[]`.
    Array(Box<GenericType>),
}

impl GenericType {
    pub fn class(name: impl Into<String>) -> Self {
        GenericType::Class(name.into())
    }

    pub fn parameterized(raw: impl Into<String>, args: Vec<GenericType>) -> Self {
        GenericType::Parameterized {
            raw: raw.into(),
            args,
        }
    }

    pub fn list_of(element: GenericType) -> Self {
        Self::parameterized("List", vec![element])
    }

    pub fn map_of(key: GenericType, value: GenericType) -> Self {
        Self::parameterized("Map", vec![key, value])
    }

    pub fn array_of(component: GenericType) -> Self {
        GenericType::Array(Box::new(component))
    }

    pub fn variable(name: impl Into<String>, declared_by: impl Into<String>) -> Self {
        GenericType::Variable {
            name: name.into(),
            declared_by: declared_by.into(),
        }
    }

    pub fn wildcard() -> Self {
        GenericType::Wildcard {
            upper: Vec::new(),
            lower: Vec::new(),
        }
    }

    pub fn extends(bound: GenericType) -> Self {
        GenericType::Wildcard {
            upper: vec![bound],
            lower: Vec::new(),
        }
    }

    pub fn super_of(bound: GenericType) -> Self {
        GenericType::Wildcard {
            upper: Vec::new(),
            lower: vec![bound],
        }
    }

    /// Raw class name for classes and parameterized types.
    pub fn raw_name(&self) -> Option<&str> {
        match self {
            GenericType::Class(name) | GenericType::Parameterized { raw: name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, GenericType::Array(_))
    }

    pub fn type_args(&self) -> &[GenericType] {
        match self {
            GenericType::Parameterized { args, .. } => args,
            _ => &[],
        }
    }
}

impl fmt::Display for GenericType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenericType::Class(name) => f.write_str(name),
            GenericType::Parameterized { raw, args } => {
                write!(f, "{}<", raw)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(">")
            }
            GenericType::Variable { name, .. } => f.write_str(name),
            GenericType::Wildcard { upper, lower } => match (lower.first(), upper.first()) {
                (Some(bound), _) => write!(f, "? super {}", bound),
                (None, Some(bound)) => write!(f, "? extends {}", bound),
                (None, None) => f.write_str("?"),
            },
            GenericType::Array(component) => write!(f, "{}[]", component),
        }
    }
}

/// What sort of class a descriptor describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassKind {
    Concrete,
    Abstract,
    Interface,
    /// An enum with its constants in declaration order.
    Enum(Vec<String>),
    /// A primitive such as `int` or `boolean`.
    Primitive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeParameter {
    pub name: String,
    pub bounds: Vec<GenericType>,
}

/// A getter/setter pair. Either side may be missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDescriptor {
    pub name: String,
    pub getter: Option<GenericType>,
    pub setter: Option<GenericType>,
}

impl PropertyDescriptor {
    /// Getter return type, else setter parameter type.
    pub fn declared_type(&self) -> Option<&GenericType> {
        self.getter.as_ref().or(self.setter.as_ref())
    }
}

/// Reflection data for one class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDescriptor {
    pub name: String,
    pub kind: ClassKind,
    pub type_params: Vec<TypeParameter>,
    pub superclass: Option<GenericType>,
    pub interfaces: Vec<GenericType>,
    pub properties: IndexMap<String, PropertyDescriptor>,
    pub fields: IndexMap<String, GenericType>,
    /// Whether a no-argument instance can be created.
    pub instantiable: bool,
}

impl ClassDescriptor {
    fn with_kind(name: impl Into<String>, kind: ClassKind, instantiable: bool) -> Self {
        Self {
            name: name.into(),
            kind,
            type_params: Vec::new(),
            superclass: None,
            interfaces: Vec::new(),
            properties: IndexMap::new(),
            fields: IndexMap::new(),
            instantiable,
        }
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self::with_kind(name, ClassKind::Concrete, true)
    }

    pub fn abstract_class(name: impl Into<String>) -> Self {
        Self::with_kind(name, ClassKind::Abstract, false)
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self::with_kind(name, ClassKind::Interface, false)
    }

    pub fn enumeration<I, S>(name: impl Into<String>, constants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let constants = constants.into_iter().map(Into::into).collect();
        Self::with_kind(name, ClassKind::Enum(constants), false)
    }

    pub fn primitive(name: impl Into<String>) -> Self {
        Self::with_kind(name, ClassKind::Primitive, false)
    }

    /// A class with no usable no-argument constructor.
    pub fn without_default_constructor(mut self) -> Self {
        self.instantiable = false;
        self
    }

    pub fn type_param(mut self, name: impl Into<String>) -> Self {
        self.type_params.push(TypeParameter {
            name: name.into(),
            bounds: Vec::new(),
        });
        self
    }

    pub fn bounded_type_param(mut self, name: impl Into<String>, bound: GenericType) -> Self {
        self.type_params.push(TypeParameter {
            name: name.into(),
            bounds: vec![bound],
        });
        self
    }

    /// A type variable of this class, for use in member declarations.
    pub fn var(&self, name: &str) -> GenericType {
        GenericType::variable(name, self.name.clone())
    }

    pub fn extends(mut self, superclass: GenericType) -> Self {
        self.superclass = Some(superclass);
        self
    }

    pub fn implements(mut self, interface: GenericType) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// A read/write property.
    pub fn property(mut self, name: impl Into<String>, ty: GenericType) -> Self {
        let name = name.into();
        self.properties.insert(
            name.clone(),
            PropertyDescriptor {
                name,
                getter: Some(ty.clone()),
                setter: Some(ty),
            },
        );
        self
    }

    pub fn read_only(mut self, name: impl Into<String>, ty: GenericType) -> Self {
        let name = name.into();
        self.properties.insert(
            name.clone(),
            PropertyDescriptor {
                name,
                getter: Some(ty),
                setter: None,
            },
        );
        self
    }

    pub fn write_only(mut self, name: impl Into<String>, ty: GenericType) -> Self {
        let name = name.into();
        self.properties.insert(
            name.clone(),
            PropertyDescriptor {
                name,
                getter: None,
                setter: Some(ty),
            },
        );
        self
    }

    /// A public field, accessed directly.
    pub fn field(mut self, name: impl Into<String>, ty: GenericType) -> Self {
        self.fields.insert(name.into(), ty);
        self
    }

    pub fn enum_constants(&self) -> Option<&[String]> {
        match &self.kind {
            ClassKind::Enum(constants) => Some(constants),
            _ => None,
        }
    }

    /// Supertypes in declaration order: superclass first, then interfaces.
    pub fn supertypes(&self) -> impl Iterator<Item = &GenericType> {
        self.superclass.iter().chain(self.interfaces.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let ty = GenericType::map_of(
            GenericType::class("String"),
            GenericType::list_of(GenericType::extends(GenericType::class("Number"))),
        );
        assert_eq!(ty.to_string(), "Map<String, List<? extends Number>>");
        assert_eq!(
            GenericType::array_of(GenericType::class("int")).to_string(),
            "int[]"
        );
        assert_eq!(GenericType::super_of(GenericType::class("Long")).to_string(), "? super Long");
    }

    #[test]
    fn test_descriptor_builder() {
        let base = ClassDescriptor::class("Base").type_param("N");
        let number = base.var("N");
        let base = base
            .field("number", number)
            .read_only("id", GenericType::class("Long"));

        assert_eq!(base.fields["number"], GenericType::variable("N", "Base"));
        assert!(base.properties["id"].setter.is_none());
        assert_eq!(
            base.properties["id"].declared_type(),
            Some(&GenericType::class("Long"))
        );
    }
}
