use std::borrow::Cow;

/// Identity of the instrumentation producing telemetry, used as the lookup
/// key for [`Meter`]s.
///
/// Two scopes are equal iff name, version and schema URL are all equal.
/// Immutable after construction.
///
/// [`Meter`]: crate::Meter
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InstrumentationScope {
    name: Cow<'static, str>,
    version: Option<Cow<'static, str>>,
    schema_url: Option<Cow<'static, str>>,
}

impl InstrumentationScope {
    /// Create a new builder for a scope with the given name.
    pub fn builder(name: impl Into<Cow<'static, str>>) -> InstrumentationScopeBuilder {
        InstrumentationScopeBuilder {
            name: name.into(),
            version: None,
            schema_url: None,
        }
    }

    /// The name of the instrumented library or application.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The version of the instrumented library, if one was supplied.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// The schema URL the emitted telemetry conforms to, if one was supplied.
    pub fn schema_url(&self) -> Option<&str> {
        self.schema_url.as_deref()
    }
}

/// Configuration options for an [`InstrumentationScope`].
#[derive(Debug)]
pub struct InstrumentationScopeBuilder {
    name: Cow<'static, str>,
    version: Option<Cow<'static, str>>,
    schema_url: Option<Cow<'static, str>>,
}

impl InstrumentationScopeBuilder {
    /// Configure the version for the scope.
    pub fn with_version(mut self, version: impl Into<Cow<'static, str>>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Configure the schema URL for the scope.
    pub fn with_schema_url(mut self, schema_url: impl Into<Cow<'static, str>>) -> Self {
        self.schema_url = Some(schema_url.into());
        self
    }

    /// Create the scope from this configuration.
    pub fn build(self) -> InstrumentationScope {
        InstrumentationScope {
            name: self.name,
            version: self.version,
            schema_url: self.schema_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_equality_covers_all_fields() {
        let make = |name: &'static str, version: Option<&'static str>| {
            let mut b = InstrumentationScope::builder(name);
            if let Some(v) = version {
                b = b.with_version(v);
            }
            b.build()
        };

        assert_eq!(make("a", None), make("a", None));
        assert_ne!(make("a", None), make("b", None));
        assert_ne!(make("a", None), make("a", Some("1.0")));
        assert_ne!(
            InstrumentationScope::builder("a").with_schema_url("s1").build(),
            InstrumentationScope::builder("a").with_schema_url("s2").build(),
        );
        // meter names are case sensitive
        assert_ne!(make("ABC", None), make("abc", None));
    }
}
