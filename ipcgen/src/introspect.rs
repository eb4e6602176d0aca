//! Schema introspection.
//!
//! `const UserSchema = z.object({...})` initializers are captured as a small
//! owned expression tree while indexing. A [`SchemaIntrospector`] turns such a
//! tree into flat fields so `z.infer<typeof UserSchema>` parameters can be
//! flattened like any interface. The resolver inlines references to other
//! schema constants before calling the introspector, so implementations only
//! ever see a closed tree.

use std::fmt;

/// A captured schema builder expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaExpr {
    /// `z.<name>(args)`
    Builder { name: String, args: Vec<SchemaArg> },
    /// `<receiver>.<name>(args)`
    Method {
        receiver: Box<SchemaExpr>,
        name: String,
        args: Vec<SchemaArg>,
    },
    /// Another schema constant, by local name.
    Reference(String),
    Unknown,
}

/// A captured call argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaArg {
    Schema(SchemaExpr),
    Object(Vec<(String, SchemaExpr)>),
    Array(Vec<SchemaArg>),
    /// Literal source text, e.g. `'admin'` or `42`.
    Literal(String),
    Other,
}

impl SchemaExpr {
    /// Whether the chain starts at a builder call or at a known schema.
    pub fn is_zod_rooted(&self, is_schema: &dyn Fn(&str) -> bool) -> bool {
        match self {
            Self::Builder { .. } => true,
            Self::Method { receiver, .. } => receiver.is_zod_rooted(is_schema),
            Self::Reference(name) => is_schema(name),
            Self::Unknown => false,
        }
    }

    fn method(receiver: SchemaExpr, name: &str) -> Self {
        Self::Method {
            receiver: Box::new(receiver),
            name: name.to_string(),
            args: Vec::new(),
        }
    }
}

/// Which side of a transforming schema to describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaMode {
    /// `z.input<...>`: defaulted fields are optional.
    Input,
    /// `z.infer<...>` and `z.output<...>`.
    Output,
}

/// One field of an object schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaField {
    pub name: String,
    pub type_text: String,
    pub optional: bool,
}

/// Capability boundary for schema libraries.
pub trait SchemaIntrospector: Send + Sync + fmt::Debug {
    /// Flat fields of an object schema, or `None` when the schema is not
    /// object-shaped.
    fn fields(&self, schema: &SchemaExpr, mode: SchemaMode) -> Option<Vec<SchemaField>>;
}

/// Static introspector for `zod` builder chains.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZodIntrospector;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Shape {
    text: String,
    optional: bool,
}

impl Shape {
    fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            optional: false,
        }
    }

    fn unknown() -> Self {
        Self::new("unknown")
    }
}

impl SchemaIntrospector for ZodIntrospector {
    fn fields(&self, schema: &SchemaExpr, mode: SchemaMode) -> Option<Vec<SchemaField>> {
        let shape = self.object_shape(schema)?;
        Some(
            shape
                .into_iter()
                .map(|(name, expr)| {
                    let rendered = self.render(&expr, mode);
                    SchemaField {
                        name,
                        type_text: rendered.text,
                        optional: rendered.optional,
                    }
                })
                .collect(),
        )
    }
}

impl ZodIntrospector {
    /// Ordered property list of an object schema, following object helpers.
    fn object_shape(&self, schema: &SchemaExpr) -> Option<Vec<(String, SchemaExpr)>> {
        match schema {
            SchemaExpr::Builder { name, args }
                if matches!(name.as_str(), "object" | "strictObject" | "looseObject") =>
            {
                match args.first() {
                    Some(SchemaArg::Object(props)) => Some(props.clone()),
                    None => Some(Vec::new()),
                    _ => None,
                }
            }
            SchemaExpr::Method {
                receiver,
                name,
                args,
            } => {
                let mut base = self.object_shape(receiver)?;
                match (name.as_str(), args.first()) {
                    ("extend", Some(SchemaArg::Object(props))) => {
                        for (key, value) in props {
                            upsert(&mut base, key, value.clone());
                        }
                    }
                    ("merge" | "extend", Some(SchemaArg::Schema(other))) => {
                        for (key, value) in self.object_shape(other)? {
                            upsert(&mut base, &key, value);
                        }
                    }
                    ("pick", Some(SchemaArg::Object(keys))) => {
                        base.retain(|(key, _)| keys.iter().any(|(k, _)| k == key));
                    }
                    ("omit", Some(SchemaArg::Object(keys))) => {
                        base.retain(|(key, _)| !keys.iter().any(|(k, _)| k == key));
                    }
                    ("partial", None) => {
                        for (_, value) in base.iter_mut() {
                            *value = SchemaExpr::method(value.clone(), "optional");
                        }
                    }
                    ("required", None) => {
                        for (_, value) in base.iter_mut() {
                            *value = strip_optional(value);
                        }
                    }
                    (
                        "strict" | "passthrough" | "strip" | "describe" | "refine"
                        | "superRefine" | "check" | "meta",
                        _,
                    ) => {}
                    _ => return None,
                }
                Some(base)
            }
            _ => None,
        }
    }

    fn render(&self, schema: &SchemaExpr, mode: SchemaMode) -> Shape {
        match schema {
            SchemaExpr::Builder { name, args } => self.render_builder(schema, name, args, mode),
            SchemaExpr::Method {
                receiver,
                name,
                args,
            } => {
                let inner = self.render(receiver, mode);
                match name.as_str() {
                    "optional" => Shape {
                        optional: true,
                        ..inner
                    },
                    "nullable" => Shape {
                        text: format!("{} | null", inner.text),
                        ..inner
                    },
                    "nullish" => Shape {
                        text: format!("{} | null", inner.text),
                        optional: true,
                    },
                    "default" | "catch" | "prefault" => Shape {
                        optional: mode == SchemaMode::Input,
                        ..inner
                    },
                    "array" => Shape::new(array_of(&inner.text)),
                    "or" => Shape {
                        text: format!("{} | {}", inner.text, self.render_arg(args.first(), mode)),
                        ..inner
                    },
                    "and" => Shape {
                        text: format!("{} & {}", inner.text, self.render_arg(args.first(), mode)),
                        ..inner
                    },
                    "extend" | "merge" | "pick" | "omit" | "partial" | "required" => {
                        match self.object_shape(schema) {
                            Some(shape) => Shape::new(self.object_text(&shape, mode)),
                            None => Shape::unknown(),
                        }
                    }
                    // Refinements and metadata do not change the shape.
                    _ => inner,
                }
            }
            SchemaExpr::Reference(_) | SchemaExpr::Unknown => Shape::unknown(),
        }
    }

    fn render_builder(
        &self,
        schema: &SchemaExpr,
        name: &str,
        args: &[SchemaArg],
        mode: SchemaMode,
    ) -> Shape {
        let text = match name {
            "string" | "email" | "uuid" | "url" | "cuid" | "cuid2" | "ulid" | "iso" | "base64"
            | "ipv4" | "ipv6" => "string".to_string(),
            "number" | "int" | "float" | "nan" => "number".to_string(),
            "boolean" => "boolean".to_string(),
            "bigint" => "bigint".to_string(),
            "date" => "Date".to_string(),
            "symbol" => "symbol".to_string(),
            "any" => "any".to_string(),
            "null" => "null".to_string(),
            "undefined" => "undefined".to_string(),
            "void" => "void".to_string(),
            "never" => "never".to_string(),
            "literal" => match args.first() {
                Some(SchemaArg::Literal(value)) => value.clone(),
                _ => "unknown".to_string(),
            },
            "enum" => match args.first() {
                Some(SchemaArg::Array(values)) => {
                    let members: Vec<String> = values
                        .iter()
                        .filter_map(|value| match value {
                            SchemaArg::Literal(text) => Some(text.clone()),
                            _ => None,
                        })
                        .collect();
                    if members.is_empty() {
                        "never".to_string()
                    } else {
                        members.join(" | ")
                    }
                }
                _ => "string".to_string(),
            },
            "array" => array_of(&self.render_arg(args.first(), mode)),
            "object" | "strictObject" | "looseObject" => match self.object_shape(schema) {
                Some(shape) => self.object_text(&shape, mode),
                None => "unknown".to_string(),
            },
            "union" => match args.first() {
                Some(SchemaArg::Array(options)) => self.union_text(options, mode),
                _ => "unknown".to_string(),
            },
            "discriminatedUnion" => match args.get(1) {
                Some(SchemaArg::Array(options)) => self.union_text(options, mode),
                _ => "unknown".to_string(),
            },
            "intersection" => format!(
                "{} & {}",
                self.render_arg(args.first(), mode),
                self.render_arg(args.get(1), mode)
            ),
            "tuple" => match args.first() {
                Some(SchemaArg::Array(items)) => {
                    let items: Vec<String> =
                        items.iter().map(|item| self.render_arg(Some(item), mode)).collect();
                    format!("[{}]", items.join(", "))
                }
                _ => "unknown[]".to_string(),
            },
            "record" => match args {
                [value] => format!("Record<string, {}>", self.render_arg(Some(value), mode)),
                [key, value, ..] => format!(
                    "Record<{}, {}>",
                    self.render_arg(Some(key), mode),
                    self.render_arg(Some(value), mode)
                ),
                [] => "Record<string, unknown>".to_string(),
            },
            "optional" => {
                return Shape {
                    text: self.render_arg(args.first(), mode),
                    optional: true,
                }
            }
            "nullable" => format!("{} | null", self.render_arg(args.first(), mode)),
            _ => "unknown".to_string(),
        };
        Shape::new(text)
    }

    fn render_arg(&self, arg: Option<&SchemaArg>, mode: SchemaMode) -> String {
        match arg {
            Some(SchemaArg::Schema(schema)) => self.render(schema, mode).text,
            Some(SchemaArg::Literal(text)) => text.clone(),
            _ => "unknown".to_string(),
        }
    }

    fn union_text(&self, options: &[SchemaArg], mode: SchemaMode) -> String {
        let options: Vec<String> = options
            .iter()
            .map(|option| self.render_arg(Some(option), mode))
            .collect();
        if options.is_empty() {
            "never".to_string()
        } else {
            options.join(" | ")
        }
    }

    fn object_text(&self, shape: &[(String, SchemaExpr)], mode: SchemaMode) -> String {
        if shape.is_empty() {
            return "{}".to_string();
        }
        let members: Vec<String> = shape
            .iter()
            .map(|(name, expr)| {
                let rendered = self.render(expr, mode);
                let marker = if rendered.optional { "?" } else { "" };
                format!("{}{marker}: {}", property_key(name), rendered.text)
            })
            .collect();
        format!("{{ {} }}", members.join("; "))
    }
}

fn upsert(shape: &mut Vec<(String, SchemaExpr)>, key: &str, value: SchemaExpr) {
    match shape.iter_mut().find(|(k, _)| k == key) {
        Some(entry) => entry.1 = value,
        None => shape.push((key.to_string(), value)),
    }
}

fn strip_optional(schema: &SchemaExpr) -> SchemaExpr {
    match schema {
        SchemaExpr::Method { receiver, name, .. } if name == "optional" => strip_optional(receiver),
        other => other.clone(),
    }
}

fn array_of(element: &str) -> String {
    let simple = element
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '$' | '.' | '<' | '>' | '[' | ']'));
    if simple {
        format!("{element}[]")
    } else {
        format!("Array<{element}>")
    }
}

fn property_key(name: &str) -> String {
    let mut chars = name.chars();
    let identifier = chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$');
    if identifier {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "\\'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder(name: &str, args: Vec<SchemaArg>) -> SchemaExpr {
        SchemaExpr::Builder {
            name: name.to_string(),
            args,
        }
    }

    fn call(receiver: SchemaExpr, name: &str, args: Vec<SchemaArg>) -> SchemaExpr {
        SchemaExpr::Method {
            receiver: Box::new(receiver),
            name: name.to_string(),
            args,
        }
    }

    fn object(props: Vec<(&str, SchemaExpr)>) -> SchemaExpr {
        builder(
            "object",
            vec![SchemaArg::Object(
                props.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            )],
        )
    }

    fn field(name: &str, type_text: &str, optional: bool) -> SchemaField {
        SchemaField {
            name: name.to_string(),
            type_text: type_text.to_string(),
            optional,
        }
    }

    #[test]
    fn test_object_fields_with_modifiers() {
        let schema = object(vec![
            ("id", call(builder("string", vec![]), "uuid", vec![])),
            ("age", call(builder("number", vec![]), "optional", vec![])),
            ("nick", call(builder("string", vec![]), "nullable", vec![])),
            ("bio", call(builder("string", vec![]), "nullish", vec![])),
        ]);

        let fields = ZodIntrospector.fields(&schema, SchemaMode::Output).unwrap();

        assert_eq!(
            fields,
            vec![
                field("id", "string", false),
                field("age", "number", true),
                field("nick", "string | null", false),
                field("bio", "string | null", true),
            ]
        );
    }

    #[test]
    fn test_default_is_optional_on_input_only() {
        let schema = object(vec![(
            "role",
            call(
                builder("string", vec![]),
                "default",
                vec![SchemaArg::Literal("'user'".to_string())],
            ),
        )]);

        let input = ZodIntrospector.fields(&schema, SchemaMode::Input).unwrap();
        let output = ZodIntrospector.fields(&schema, SchemaMode::Output).unwrap();

        assert!(input[0].optional);
        assert!(!output[0].optional);
    }

    #[test]
    fn test_enum_array_record_and_nested_object() {
        let schema = object(vec![
            (
                "role",
                builder(
                    "enum",
                    vec![SchemaArg::Array(vec![
                        SchemaArg::Literal("'admin'".to_string()),
                        SchemaArg::Literal("'user'".to_string()),
                    ])],
                ),
            ),
            ("tags", call(builder("string", vec![]), "array", vec![])),
            (
                "meta",
                builder(
                    "record",
                    vec![SchemaArg::Schema(builder("number", vec![]))],
                ),
            ),
            ("address", object(vec![("city", builder("string", vec![]))])),
        ]);

        let fields = ZodIntrospector.fields(&schema, SchemaMode::Output).unwrap();

        assert_eq!(fields[0].type_text, "'admin' | 'user'");
        assert_eq!(fields[1].type_text, "string[]");
        assert_eq!(fields[2].type_text, "Record<string, number>");
        assert_eq!(fields[3].type_text, "{ city: string }");
    }

    #[test]
    fn test_extend_pick_and_partial() {
        let base = object(vec![
            ("id", builder("string", vec![])),
            ("name", builder("string", vec![])),
        ]);
        let extended = call(
            base.clone(),
            "extend",
            vec![SchemaArg::Object(vec![(
                "admin".to_string(),
                builder("boolean", vec![]),
            )])],
        );
        let picked = call(
            extended.clone(),
            "pick",
            vec![SchemaArg::Object(vec![(
                "admin".to_string(),
                SchemaExpr::Unknown,
            )])],
        );
        let partial = call(base, "partial", vec![]);

        let names = |schema: &SchemaExpr| -> Vec<String> {
            ZodIntrospector
                .fields(schema, SchemaMode::Output)
                .unwrap()
                .into_iter()
                .map(|f| f.name)
                .collect()
        };
        assert_eq!(names(&extended), vec!["id", "name", "admin"]);
        assert_eq!(names(&picked), vec!["admin"]);
        assert!(ZodIntrospector
            .fields(&partial, SchemaMode::Output)
            .unwrap()
            .iter()
            .all(|f| f.optional));
    }

    #[test]
    fn test_non_object_schema_has_no_fields() {
        assert_eq!(
            ZodIntrospector.fields(&builder("string", vec![]), SchemaMode::Output),
            None
        );
        assert_eq!(
            ZodIntrospector.fields(&SchemaExpr::Reference("Other".to_string()), SchemaMode::Output),
            None
        );
    }

    #[test]
    fn test_union_renders_array_as_generic() {
        let schema = object(vec![(
            "value",
            call(
                builder(
                    "union",
                    vec![SchemaArg::Array(vec![
                        SchemaArg::Schema(builder("string", vec![])),
                        SchemaArg::Schema(builder("number", vec![])),
                    ])],
                ),
                "array",
                vec![],
            ),
        )]);

        let fields = ZodIntrospector.fields(&schema, SchemaMode::Output).unwrap();
        assert_eq!(fields[0].type_text, "Array<string | number>");
    }

    #[test]
    fn test_property_key_quotes_non_identifiers() {
        assert_eq!(property_key("plain"), "plain");
        assert_eq!(property_key("with-dash"), "'with-dash'");
    }
}
