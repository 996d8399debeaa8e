// Registry of class descriptors and default implementations

use crate::types::{ClassDescriptor, ClassKind, GenericType};
use crate::value::Value;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet, VecDeque};

/// A property or field found on a class or one of its supertypes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProperty {
    pub name: String,
    /// Class that declares the member; type variables in `declared_type` belong to it.
    pub declared_by: String,
    pub declared_type: GenericType,
    pub readable: bool,
    pub writable: bool,
    /// Accessed as a public field rather than through accessors.
    pub field: bool,
}

/// Every class the binding engine knows about.
///
/// [`TypeRegistry::new`] comes with the scalar wrappers, primitives and the
/// standard collection hierarchy, and maps `List`, `Collection`, `Set`,
/// `SortedSet`, `Map` and `SortedMap` to concrete implementations.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    classes: HashMap<String, ClassDescriptor>,
    implementations: HashMap<String, String>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// A registry without any classes.
    pub fn empty() -> Self {
        Self {
            classes: HashMap::new(),
            implementations: HashMap::new(),
        }
    }

    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_builtins();
        registry
    }

    fn register_builtins(&mut self) {
        let class = GenericType::class;
        let param = |raw: &str, vars: &[(&str, &str)]| {
            GenericType::parameterized(
                raw,
                vars.iter()
                    .map(|(name, owner)| GenericType::variable(*name, *owner))
                    .collect(),
            )
        };

        for primitive in ["int", "long", "short", "byte", "float", "double", "boolean", "char"] {
            self.register(ClassDescriptor::primitive(primitive));
        }

        self.register(ClassDescriptor::class("Object"));
        self.register(ClassDescriptor::interface("CharSequence"));
        self.register(ClassDescriptor::class("String").implements(class("CharSequence")));
        self.register(ClassDescriptor::abstract_class("Number"));
        for wrapper in ["Integer", "Long", "Short", "Byte", "Float", "Double"] {
            self.register(
                ClassDescriptor::class(wrapper)
                    .extends(class("Number"))
                    .without_default_constructor(),
            );
        }
        self.register(ClassDescriptor::class("Boolean").without_default_constructor());
        self.register(ClassDescriptor::class("Character").without_default_constructor());

        self.register(ClassDescriptor::interface("Collection").type_param("E"));
        for (name, parent) in [("List", "Collection"), ("Set", "Collection"), ("SortedSet", "Set")] {
            self.register(
                ClassDescriptor::interface(name)
                    .type_param("E")
                    .implements(param(parent, &[("E", name)])),
            );
        }
        for (name, iface) in [
            ("ArrayList", "List"),
            ("LinkedList", "List"),
            ("HashSet", "Set"),
            ("TreeSet", "SortedSet"),
        ] {
            self.register(
                ClassDescriptor::class(name)
                    .type_param("E")
                    .implements(param(iface, &[("E", name)])),
            );
        }
        self.register(
            ClassDescriptor::class("LinkedHashSet")
                .type_param("E")
                .extends(param("HashSet", &[("E", "LinkedHashSet")])),
        );

        self.register(ClassDescriptor::interface("Map").type_param("K").type_param("V"));
        self.register(
            ClassDescriptor::interface("SortedMap")
                .type_param("K")
                .type_param("V")
                .implements(param("Map", &[("K", "SortedMap"), ("V", "SortedMap")])),
        );
        self.register(
            ClassDescriptor::class("HashMap")
                .type_param("K")
                .type_param("V")
                .implements(param("Map", &[("K", "HashMap"), ("V", "HashMap")])),
        );
        self.register(
            ClassDescriptor::class("LinkedHashMap")
                .type_param("K")
                .type_param("V")
                .extends(param("HashMap", &[("K", "LinkedHashMap"), ("V", "LinkedHashMap")])),
        );
        self.register(
            ClassDescriptor::class("TreeMap")
                .type_param("K")
                .type_param("V")
                .implements(param("SortedMap", &[("K", "TreeMap"), ("V", "TreeMap")])),
        );

        for (iface, implementation) in [
            ("List", "ArrayList"),
            ("Collection", "ArrayList"),
            ("Set", "HashSet"),
            ("SortedSet", "TreeSet"),
            ("Map", "HashMap"),
            ("SortedMap", "TreeMap"),
        ] {
            self.register_implementation(iface, implementation);
        }
    }

    /// Add or replace a class.
    pub fn register(&mut self, descriptor: ClassDescriptor) -> &mut Self {
        self.classes.insert(descriptor.name.clone(), descriptor);
        self
    }

    /// Use `implementation` whenever an instance of `interface` must be created.
    pub fn register_implementation(
        &mut self,
        interface: impl Into<String>,
        implementation: impl Into<String>,
    ) -> &mut Self {
        self.implementations
            .insert(interface.into(), implementation.into());
        self
    }

    pub fn get(&self, class: &str) -> Option<&ClassDescriptor> {
        self.classes.get(class)
    }

    pub fn contains(&self, class: &str) -> bool {
        self.classes.contains_key(class)
    }

    pub fn implementation_for(&self, class: &str) -> Option<&str> {
        self.implementations.get(class).map(String::as_str)
    }

    /// `class` followed by all its supertypes, breadth first.
    pub fn ancestors<'a>(&'a self, class: &'a str) -> Vec<&'a str> {
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::from([class]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            order.push(current);
            if let Some(descriptor) = self.classes.get(current) {
                queue.extend(descriptor.supertypes().filter_map(GenericType::raw_name));
            }
        }
        order
    }

    /// Whether a value of class `from` can be used where `to` is declared.
    pub fn is_assignable(&self, from: &str, to: &str) -> bool {
        to == "Object" || self.ancestors(from).contains(&to)
    }

    pub fn is_collection(&self, class: &str) -> bool {
        self.is_assignable(class, "Collection") && class != "Object"
    }

    pub fn is_list(&self, class: &str) -> bool {
        self.is_assignable(class, "List") && class != "Object"
    }

    pub fn is_map(&self, class: &str) -> bool {
        self.is_assignable(class, "Map") && class != "Object"
    }

    pub fn is_enum(&self, class: &str) -> bool {
        matches!(
            self.classes.get(class).map(|c| &c.kind),
            Some(ClassKind::Enum(_))
        )
    }

    /// Find `name` on `class`: accessor properties anywhere in the hierarchy
    /// win over public fields.
    pub fn find_property(&self, class: &str, name: &str) -> Option<ResolvedProperty> {
        let ancestors = self.ancestors(class);

        let accessor = ancestors.iter().find_map(|owner| {
            let descriptor = self.classes.get(*owner)?;
            let property = descriptor.properties.get(name)?;
            Some(ResolvedProperty {
                name: name.to_string(),
                declared_by: descriptor.name.clone(),
                declared_type: property.declared_type()?.clone(),
                readable: property.getter.is_some(),
                writable: property.setter.is_some(),
                field: false,
            })
        });

        accessor.or_else(|| {
            ancestors.iter().find_map(|owner| {
                let descriptor = self.classes.get(*owner)?;
                let ty = descriptor.fields.get(name)?;
                Some(ResolvedProperty {
                    name: name.to_string(),
                    declared_by: descriptor.name.clone(),
                    declared_type: ty.clone(),
                    readable: true,
                    writable: true,
                    field: true,
                })
            })
        })
    }

    /// Create a default instance of `class`, resolving interfaces and abstract
    /// classes through their registered implementation.
    pub fn new_instance(&self, class: &str) -> std::result::Result<Value, String> {
        let descriptor = self
            .classes
            .get(class)
            .ok_or_else(|| format!("class {} is not registered", class))?;

        match &descriptor.kind {
            ClassKind::Interface | ClassKind::Abstract => match self.implementation_for(class) {
                Some(implementation) if implementation != class => {
                    self.new_instance(implementation)
                }
                _ => Err(format!(
                    "no implementation is registered for {} {}",
                    if descriptor.kind == ClassKind::Interface {
                        "interface"
                    } else {
                        "abstract class"
                    },
                    class
                )),
            },
            ClassKind::Enum(constants) => constants
                .first()
                .map(|constant| Value::enumeration(class, constant.clone()))
                .ok_or_else(|| format!("enum {} declares no constants", class)),
            ClassKind::Primitive => Err(format!("cannot instantiate primitive type {}", class)),
            ClassKind::Concrete if !descriptor.instantiable => {
                Err(format!("class {} has no default constructor", class))
            }
            ClassKind::Concrete if class == "String" => Ok(Value::String(String::new())),
            ClassKind::Concrete if self.is_map(class) => Ok(Value::Map {
                class: class.to_string(),
                entries: IndexMap::new(),
            }),
            ClassKind::Concrete if self.is_collection(class) => Ok(Value::Collection {
                class: class.to_string(),
                items: Vec::new(),
            }),
            ClassKind::Concrete => Ok(Value::bean(class)),
        }
    }

    /// The value a property of this class holds when "unset": zero for
    /// primitives, null for everything else.
    pub fn zero_value(class: &str) -> Value {
        match class {
            "int" | "short" | "byte" => Value::Integer(0),
            "long" => Value::Long(0),
            "float" => Value::Float(0.0),
            "double" => Value::Double(0.0),
            "boolean" => Value::Boolean(false),
            "char" => Value::Char('\0'),
            _ => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_hierarchy() {
        let registry = TypeRegistry::new();
        assert!(registry.is_list("ArrayList"));
        assert!(registry.is_collection("TreeSet"));
        assert!(!registry.is_list("HashSet"));
        assert!(registry.is_map("LinkedHashMap"));
        assert!(registry.is_assignable("Long", "Number"));
        assert!(registry.is_assignable("Person", "Object"));
        assert!(!registry.is_map("Object"));
    }

    #[test]
    fn test_new_instance_uses_registered_implementations() {
        let registry = TypeRegistry::new();
        assert_eq!(
            registry.new_instance("List").unwrap(),
            Value::Collection {
                class: "ArrayList".into(),
                items: vec![]
            }
        );
        assert_eq!(registry.new_instance("SortedMap").unwrap().class_name().as_deref(), Some("TreeMap"));
        assert_eq!(registry.new_instance("String").unwrap(), Value::from(""));
        assert!(registry.new_instance("Integer").is_err());
        assert!(registry.new_instance("int").is_err());
        assert!(registry.new_instance("Unknown").is_err());
    }

    #[test]
    fn test_abstract_without_implementation() {
        let mut registry = TypeRegistry::new();
        registry.register(ClassDescriptor::abstract_class("Shape"));
        let err = registry.new_instance("Shape").unwrap_err();
        assert!(err.contains("abstract class Shape"));

        registry
            .register(ClassDescriptor::class("Circle").extends(GenericType::class("Shape")))
            .register_implementation("Shape", "Circle");
        assert_eq!(registry.new_instance("Shape").unwrap(), Value::bean("Circle"));
    }

    #[test]
    fn test_enum_default_is_first_constant() {
        let mut registry = TypeRegistry::new();
        registry.register(ClassDescriptor::enumeration("Color", ["RED", "GREEN"]));
        assert_eq!(
            registry.new_instance("Color").unwrap(),
            Value::enumeration("Color", "RED")
        );
        assert!(registry.is_enum("Color"));
    }

    #[test]
    fn test_find_property_prefers_accessors_over_fields() {
        let mut registry = TypeRegistry::new();
        registry.register(
            ClassDescriptor::class("Base")
                .field("id", GenericType::class("String"))
                .read_only("label", GenericType::class("String")),
        );
        registry.register(
            ClassDescriptor::class("Child")
                .extends(GenericType::class("Base"))
                .property("id", GenericType::class("Long")),
        );

        let id = registry.find_property("Child", "id").unwrap();
        assert_eq!(id.declared_type, GenericType::class("Long"));
        assert!(!id.field);

        let label = registry.find_property("Child", "label").unwrap();
        assert_eq!(label.declared_by, "Base");
        assert!(label.readable && !label.writable);

        assert!(registry.find_property("Child", "missing").is_none());
    }

    #[test]
    fn test_zero_values() {
        assert_eq!(TypeRegistry::zero_value("int"), Value::Integer(0));
        assert_eq!(TypeRegistry::zero_value("boolean"), Value::Boolean(false));
        assert_eq!(TypeRegistry::zero_value("char"), Value::Char('\0'));
        assert_eq!(TypeRegistry::zero_value("Integer"), Value::Null);
    }
}
