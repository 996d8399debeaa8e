//! URL bindings with embedded parameters.
//!
//! A binding pattern such as `/calc/{a}/{b=5}.action` maps URIs to an action
//! bean. It splits into a literal *path* (`/calc`) followed by components:
//! literals (`/`, `.action`) and parameters (`a`, `b` with default `5`). The
//! trailing literal of a binding with parameters is its *suffix*.
//!
//! The special `$event` parameter names the event to handle. It may not carry
//! a default; the bean's default handler plays that role.

use crate::http::Parameters;
use crate::{Error, Result};
use lintel_log::{debug, warn};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Name of the URL parameter that selects the event.
pub const EVENT_PARAMETER: &str = "$event";

/// A named parameter of a URL binding, with its value once matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlBindingParameter {
    name: String,
    value: Option<String>,
    default_value: Option<String>,
}

impl UrlBindingParameter {
    pub fn new(name: impl Into<String>, default_value: Option<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            default_value,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The value extracted from the URI, else the default.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref().or(self.default_value.as_deref())
    }

    /// The value extracted from the URI, ignoring the default.
    pub fn raw_value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn default_value(&self) -> Option<&str> {
        self.default_value.as_deref()
    }

    /// A copy of this prototype carrying a matched value.
    pub fn with_value(&self, value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..self.clone()
        }
    }

    pub fn is_event(&self) -> bool {
        self.name == EVENT_PARAMETER
    }
}

impl fmt::Display for UrlBindingParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.default_value {
            Some(default) => write!(f, "{}={}", self.name, default),
            None => f.write_str(&self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlComponent {
    Literal(String),
    Parameter(UrlBindingParameter),
}

/// A parsed URL binding, either a prototype or a match against a URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlBinding {
    bean_class: String,
    path: String,
    components: Vec<UrlComponent>,
    suffix: Option<String>,
}

impl UrlBinding {
    pub fn new(
        bean_class: impl Into<String>,
        path: impl Into<String>,
        components: Vec<UrlComponent>,
    ) -> Self {
        let has_parameters = components
            .iter()
            .any(|c| matches!(c, UrlComponent::Parameter(_)));
        let suffix = match components.last() {
            Some(UrlComponent::Literal(literal)) if has_parameters => Some(literal.clone()),
            _ => None,
        };
        Self {
            bean_class: bean_class.into(),
            path: path.into(),
            components,
            suffix,
        }
    }

    /// Parse a binding pattern for `bean_class`.
    ///
    /// ```
    /// use lintel_core::UrlBinding;
    ///
    /// let binding = UrlBinding::parse("CalculatorAction", "/calc/{a}/{b=5}.action").unwrap();
    /// assert_eq!(binding.path(), "/calc");
    /// assert_eq!(binding.suffix(), Some(".action"));
    /// assert_eq!(binding.parameter("b").and_then(|p| p.value()), Some("5"));
    /// ```
    pub fn parse(bean_class: &str, pattern: &str) -> Result<Self> {
        if pattern.is_empty() {
            return Err(Error::UrlBinding(format!(
                "action bean {} has an empty URL binding",
                bean_class
            )));
        }

        let mut path: Option<String> = None;
        let mut components = Vec::new();
        let mut brace_level = 0usize;
        let mut escape = false;
        let mut buf = String::with_capacity(pattern.len());

        for c in pattern.chars() {
            if !escape {
                match c {
                    '{' => {
                        brace_level += 1;
                        if brace_level == 1 {
                            match path {
                                None => {
                                    // trailing non-identifier characters start the first literal
                                    let end = buf.trim_end_matches(|ch| !is_identifier_part(ch)).len();
                                    if end == 0 {
                                        path = Some(buf.clone());
                                    } else {
                                        path = Some(buf[..end].to_string());
                                        push_literal(&mut components, &buf[end..]);
                                    }
                                }
                                Some(_) => push_literal(&mut components, &buf),
                            }
                            buf.clear();
                            continue;
                        }
                    }
                    '}' if brace_level > 0 => {
                        brace_level -= 1;
                        if brace_level == 0 {
                            components.push(UrlComponent::Parameter(parse_parameter(
                                bean_class, pattern, &buf,
                            )?));
                            buf.clear();
                            continue;
                        }
                    }
                    '\\' => {
                        escape = true;
                        continue;
                    }
                    _ => {}
                }
            }
            buf.push(c);
            escape = false;
        }

        if escape {
            return Err(Error::UrlBinding(format!(
                "'{}' must not end with escape character",
                pattern
            )));
        }
        if brace_level > 0 {
            return Err(Error::UrlBinding(format!(
                "Unterminated left brace ('{{') in '{}'",
                pattern
            )));
        }
        if !buf.is_empty() {
            match path {
                None => path = Some(buf),
                Some(_) => push_literal(&mut components, &buf),
            }
        }

        Ok(Self::new(bean_class, path.unwrap_or_default(), components))
    }

    pub fn bean_class(&self) -> &str {
        &self.bean_class
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn components(&self) -> &[UrlComponent] {
        &self.components
    }

    pub fn suffix(&self) -> Option<&str> {
        self.suffix.as_deref()
    }

    pub fn parameters(&self) -> impl Iterator<Item = &UrlBindingParameter> {
        self.components.iter().filter_map(|c| match c {
            UrlComponent::Parameter(p) => Some(p),
            UrlComponent::Literal(_) => None,
        })
    }

    pub fn parameter(&self, name: &str) -> Option<&UrlBindingParameter> {
        self.parameters().find(|p| p.name() == name)
    }

    /// Merge the values extracted from the URI with request parameters.
    ///
    /// A name present in both gets the URI value first. Defaults only fill
    /// names the request does not carry. A matched `$event` becomes a
    /// parameter named after the event with an empty value.
    pub fn merge_parameters(&self, request: &Parameters) -> Parameters {
        let mut merged = request.clone();
        for parameter in self.parameters() {
            if parameter.is_event() {
                if let Some(event) = parameter.raw_value() {
                    merged
                        .entry(event.to_string())
                        .or_insert_with(|| vec![String::new()]);
                }
                continue;
            }

            match (parameter.raw_value(), merged.get_mut(parameter.name())) {
                (Some(value), Some(existing)) => existing.insert(0, value.to_string()),
                (Some(value), None) => {
                    merged.insert(parameter.name().to_string(), vec![value.to_string()]);
                }
                (None, None) => {
                    if let Some(default) = parameter.default_value() {
                        merged.insert(parameter.name().to_string(), vec![default.to_string()]);
                    }
                }
                (None, Some(_)) => {}
            }
        }
        merged
    }

    /// Build a URL for this binding. Binding parameters are substituted
    /// (falling back to defaults) up to the first one without a value; all
    /// other parameters go into the query string.
    pub fn build_url(&self, parameters: &Parameters) -> String {
        let mut remaining = parameters.clone();
        let mut url = self.path.clone();
        let mut pending = String::new();
        let mut complete = true;

        for component in &self.components {
            match component {
                UrlComponent::Literal(literal) => pending.push_str(literal),
                UrlComponent::Parameter(parameter) => {
                    let supplied = remaining
                        .shift_remove(parameter.name())
                        .and_then(|values| values.into_iter().next());
                    match supplied
                        .filter(|v| !v.is_empty())
                        .or_else(|| parameter.default_value().map(str::to_string))
                    {
                        Some(value) => {
                            url.push_str(&pending);
                            pending.clear();
                            url.push_str(&urlencoding::encode(&value));
                        }
                        None => {
                            complete = false;
                            break;
                        }
                    }
                }
            }
        }

        if complete {
            url.push_str(&pending);
        } else if let Some(suffix) = &self.suffix {
            url.push_str(suffix);
        }

        append_query(url, &remaining)
    }
}

impl fmt::Display for UrlBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)?;
        for component in &self.components {
            match component {
                UrlComponent::Literal(literal) => f.write_str(literal)?,
                UrlComponent::Parameter(parameter) => write!(f, "{{{}}}", parameter)?,
            }
        }
        Ok(())
    }
}

/// Append parameters to `url` as an encoded query string.
pub(crate) fn append_query(mut url: String, parameters: &Parameters) -> String {
    let mut separator = if url.contains('?') { '&' } else { '?' };
    for (name, values) in parameters {
        for value in values {
            url.push(separator);
            url.push_str(&urlencoding::encode(name));
            url.push('=');
            url.push_str(&urlencoding::encode(value));
            separator = '&';
        }
    }
    url
}

fn is_identifier_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn push_literal(components: &mut Vec<UrlComponent>, literal: &str) {
    if !literal.is_empty() {
        components.push(UrlComponent::Literal(literal.to_string()));
    }
}

fn parse_parameter(bean_class: &str, pattern: &str, text: &str) -> Result<UrlBindingParameter> {
    let mut name = String::new();
    let mut default = String::new();
    let mut in_default = false;
    let mut escape = false;

    for c in text.chars() {
        if !escape {
            match c {
                '\\' => {
                    escape = true;
                    continue;
                }
                '=' => {
                    in_default = true;
                    continue;
                }
                _ => {}
            }
        }
        if in_default {
            default.push(c);
        } else {
            name.push(c);
        }
        escape = false;
    }

    let default = (!default.is_empty()).then_some(default);
    if default.is_some() && name == EVENT_PARAMETER {
        return Err(Error::UrlBinding(format!(
            "In '{}' of action bean {}, the {} parameter may not be assigned a default value. \
             Its default is the bean's default handler.",
            pattern, bean_class, EVENT_PARAMETER
        )));
    }
    Ok(UrlBindingParameter::new(name, default))
}

/// Registry of binding prototypes, by bean class and by path.
#[derive(Debug, Default)]
pub struct UrlBindingFactory {
    by_class: HashMap<String, Arc<UrlBinding>>,
    by_path: HashMap<String, Arc<UrlBinding>>,
    conflicts: HashMap<String, Vec<String>>,
    // longest prefix first
    prefixes: Vec<(String, Vec<Arc<UrlBinding>>)>,
}

impl UrlBindingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bean_classes(&self) -> impl Iterator<Item = &str> {
        self.by_class.keys().map(String::as_str)
    }

    pub fn binding_for_class(&self, bean_class: &str) -> Option<&Arc<UrlBinding>> {
        self.by_class.get(bean_class)
    }

    /// Register a prototype under its path, its path with a trailing slash,
    /// its path plus suffix and its pattern, plus the prefixes used for
    /// matching URIs with parameter values.
    pub fn add_binding(&mut self, binding: UrlBinding) -> Arc<UrlBinding> {
        let binding = Arc::new(binding);
        let path = binding.path().to_string();
        let path_plus_slash = if path.ends_with('/') {
            path.clone()
        } else {
            format!("{}/", path)
        };

        self.cache_path(&path, &binding);
        if path != path_plus_slash {
            self.cache_path(&path_plus_slash, &binding);
        }
        if let Some(suffix) = binding.suffix() {
            self.cache_path(&format!("{}{}", path, suffix), &binding);
        }
        let pattern = binding.to_string();
        if pattern != path {
            self.cache_path(&pattern, &binding);
        }

        match binding.components().first() {
            Some(UrlComponent::Literal(literal)) => {
                let path_plus_literal = format!("{}{}", path, literal);
                self.cache_prefix(&path_plus_literal, &binding);
                if path_plus_literal != path_plus_slash {
                    self.cache_prefix(&path_plus_slash, &binding);
                }
            }
            _ => self.cache_prefix(&path_plus_slash, &binding),
        }

        self.by_class
            .insert(binding.bean_class().to_string(), binding.clone());
        binding
    }

    fn cache_path(&mut self, path: &str, binding: &Arc<UrlBinding>) {
        if let Some(conflicting) = self.conflicts.get_mut(path) {
            warn!(
                "The path {} for {} @ {} conflicts with {:?}",
                path,
                binding.bean_class(),
                binding,
                conflicting
            );
            conflicting.push(binding.to_string());
        } else if let Some(existing) = self.by_path.remove(path) {
            warn!(
                "The path {} for {} @ {} conflicts with {}",
                path,
                binding.bean_class(),
                binding,
                existing
            );
            self.conflicts
                .insert(path.to_string(), vec![existing.to_string(), binding.to_string()]);
        } else {
            debug!("Wiring path {} to {} @ {}", path, binding.bean_class(), binding);
            self.by_path.insert(path.to_string(), binding.clone());
        }
    }

    fn cache_prefix(&mut self, prefix: &str, binding: &Arc<UrlBinding>) {
        debug!("Wiring prefix {}* to {} @ {}", prefix, binding.bean_class(), binding);

        let index = match self.prefixes.iter().position(|(p, _)| p == prefix) {
            Some(index) => index,
            None => {
                self.prefixes.push((prefix.to_string(), Vec::new()));
                self.prefixes
                    .sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
                self.prefixes
                    .iter()
                    .position(|(p, _)| p == prefix)
                    .unwrap_or_default()
            }
        };

        let bindings = &mut self.prefixes[index].1;
        let pattern = binding.to_string();
        if !bindings.iter().any(|b| b.to_string() == pattern) {
            bindings.push(binding.clone());
            bindings.sort_by(|a, b| {
                a.components()
                    .len()
                    .cmp(&b.components().len())
                    .then_with(|| a.to_string().cmp(&b.to_string()))
            });
        }
    }

    /// Find the prototype a URI maps to: an exact path first, then among the
    /// bindings sharing the longest matching prefix, the one whose literals
    /// match deepest into the URI with the fewest components.
    pub fn get_binding_prototype(&self, uri: &str) -> Result<Option<Arc<UrlBinding>>> {
        if let Some(prototype) = self.by_path.get(uri) {
            debug!("Matched {} to {}", uri, prototype);
            return Ok(Some(prototype.clone()));
        }
        if let Some(candidates) = self.conflicts.get(uri) {
            return Err(Error::UrlBindingConflict {
                uri: uri.to_string(),
                candidates: candidates.clone(),
            });
        }

        let Some(candidates) = self
            .prefixes
            .iter()
            .find(|(prefix, _)| uri.starts_with(prefix.as_str()))
            .map(|(_, bindings)| bindings)
        else {
            debug!("No URL binding matches {}", uri);
            return Ok(None);
        };
        if let [only] = candidates.as_slice() {
            debug!("Matched {} to {}", uri, only);
            return Ok(Some(only.clone()));
        }

        let mut max_index = 0;
        let mut min_components = usize::MAX;
        let mut prototype: Option<&Arc<UrlBinding>> = None;
        let mut conflicts: Option<Vec<String>> = None;

        for binding in candidates {
            let mut index = binding.path().len();
            for component in binding.components() {
                if let UrlComponent::Literal(literal) = component {
                    match uri.get(index..).and_then(|rest| rest.find(literal.as_str())) {
                        Some(at) => index += at + literal.len(),
                        None => break,
                    }
                }
            }

            let count = binding.components().len();
            if index > max_index {
                conflicts = None;
                min_components = count;
                prototype = Some(binding);
                max_index = index;
            } else if index == max_index {
                if count < min_components {
                    conflicts = None;
                    min_components = count;
                    prototype = Some(binding);
                } else if count == min_components {
                    let list = conflicts.get_or_insert_with(|| {
                        prototype.map(|p| vec![p.to_string()]).unwrap_or_default()
                    });
                    list.push(binding.to_string());
                    prototype = None;
                }
            }
        }

        match prototype {
            Some(prototype) => {
                debug!("Matched @{} {} to {}", max_index, uri, prototype);
                Ok(Some(prototype.clone()))
            }
            None => Err(Error::UrlBindingConflict {
                uri: uri.to_string(),
                candidates: conflicts.unwrap_or_default(),
            }),
        }
    }

    /// Match a URI and extract its parameter values. Trailing slashes and a
    /// literal suffix are ignored; parameters without a value in the URI are
    /// kept so their defaults stay available.
    pub fn get_binding(&self, uri: &str) -> Result<Option<UrlBinding>> {
        let Some(prototype) = self.get_binding_prototype(uri)? else {
            return Ok(None);
        };

        let mut length = uri.trim_end_matches('/').len();
        if let Some(suffix) = prototype.suffix() {
            if uri[..length].ends_with(suffix) {
                length -= suffix.len();
            }
        }

        let mut components = Vec::with_capacity(prototype.components().len());
        let mut index = prototype.path().len().min(length);
        let mut current: Option<&UrlBindingParameter> = None;
        let mut value: Option<String> = None;
        let mut iter = prototype.components().iter();

        while index < length {
            let Some(component) = iter.next() else {
                break;
            };
            match component {
                UrlComponent::Literal(literal) => {
                    match uri[index..length].find(literal.as_str()) {
                        Some(at) => {
                            value = Some(uri[index..index + at].to_string());
                            index += at + literal.len();
                        }
                        None => {
                            value = Some(uri[index..length].to_string());
                            index = length;
                        }
                    }
                    match (current, value.as_deref()) {
                        (Some(parameter), Some(v)) if !v.is_empty() => {
                            components.push(UrlComponent::Parameter(parameter.with_value(v)));
                            components.push(component.clone());
                            current = None;
                            value = None;
                        }
                        (None, _) => components.push(component.clone()),
                        _ => {}
                    }
                }
                UrlComponent::Parameter(parameter) => current = Some(parameter),
            }
        }

        if index < length {
            value = Some(uri[index..length].to_string());
        }
        if let (Some(parameter), Some(v)) = (current, value.as_deref()) {
            if !v.is_empty() {
                components.push(UrlComponent::Parameter(parameter.with_value(v)));
            }
        }
        components.extend(iter.cloned());

        Ok(Some(UrlBinding::new(
            prototype.bean_class(),
            prototype.path(),
            components,
        )))
    }
}
