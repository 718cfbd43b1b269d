//! Backtick identifier quoting and attribute qualification.
//!
//! Builder calls store bare attributes as `{attr}` placeholders; [`map_qualifiers`] resolves
//! them against the table alias when the statement is rendered:
//!
//! - `{age}` with alias `user` → `` `user`.`age` ``
//! - `{u.name}` → `` `u`.`name` ``
//! - `{u.*}` → `` `u`.* ``
//! - `{*}` → `` `user`.* `` (or `*` without an alias)
//!
//! # Example
//! ```ignore
//! use adorm::ident::{map_qualifiers, quote_ident};
//!
//! assert_eq!(quote_ident("user"), "`user`");
//! assert_eq!(map_qualifiers("{age} >= ?", Some("user")), "`user`.`age` >= ?");
//! ```

/// Prefix marking an attribute as raw SQL that must not be qualified.
pub const RAW_PREFIX: char = '!';

/// Quote a single identifier with backticks, doubling embedded backticks.
pub fn quote_ident(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    write_quoted(&mut out, name);
    out
}

pub(crate) fn write_quoted(out: &mut String, name: &str) {
    out.push('`');
    for ch in name.chars() {
        if ch == '`' {
            out.push_str("``");
        } else {
            out.push(ch);
        }
    }
    out.push('`');
}

/// Qualify an attribute with a table alias.
///
/// Dotted names (`t.col`, `t.*`) carry their own qualifier and ignore `alias`.
pub fn qualify(alias: Option<&str>, attribute: &str) -> String {
    if let Some((table, column)) = attribute.split_once('.') {
        if !table.is_empty() && !column.is_empty() {
            let mut out = quote_ident(table);
            out.push('.');
            if column == "*" {
                out.push('*');
            } else {
                write_quoted(&mut out, column);
            }
            return out;
        }
    }

    match (alias, attribute) {
        (None, "*") => "*".to_string(),
        (Some(alias), "*") => format!("{}.*", quote_ident(alias)),
        (None, attr) => quote_ident(attr),
        (Some(alias), attr) => format!("{}.{}", quote_ident(alias), quote_ident(attr)),
    }
}

/// Turn a user-supplied attribute into its placeholder form.
///
/// - `!expr` → `expr` verbatim
/// - `{...}` → unchanged
/// - `attr` → `{scope.attr}` when a scoped alias is active, else `{attr}`
pub(crate) fn field(attribute: &str, scope: Option<&str>) -> String {
    let attribute = attribute.trim();
    if let Some(raw) = attribute.strip_prefix(RAW_PREFIX) {
        return raw.trim_start_matches(RAW_PREFIX).to_string();
    }
    if attribute.starts_with('{') {
        return attribute.to_string();
    }
    match scope {
        Some(scope) if !attribute.contains('.') => format!("{{{scope}.{attribute}}}"),
        _ => format!("{{{attribute}}}"),
    }
}

/// Replace every `{...}` placeholder in `sql` with its qualified identifier.
///
/// Unterminated braces are copied through unchanged.
pub fn map_qualifiers(sql: &str, alias: Option<&str>) -> String {
    if !sql.contains('{') {
        return sql.to_string();
    }

    let mut out = String::with_capacity(sql.len() + 16);
    let mut rest = sql;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                out.push_str(&qualify(alias, &after[..close]));
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// A table expression as accepted by `from`/`join`: `name`, `name alias` or `name AS alias`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub name: String,
    pub alias: Option<String>,
}

impl TableRef {
    pub fn parse(expr: &str) -> Self {
        let parts: Vec<&str> = expr.split_whitespace().collect();
        match parts.as_slice() {
            [] => Self {
                name: String::new(),
                alias: None,
            },
            [name] => Self {
                name: (*name).to_string(),
                alias: None,
            },
            [name, .., alias] => Self {
                name: (*name).to_string(),
                alias: (*alias != *name).then(|| (*alias).to_string()),
            },
        }
    }

    /// The name used to qualify attributes: the alias, or the bare table name.
    pub fn qualifier(&self) -> &str {
        match &self.alias {
            Some(alias) => alias,
            None => self.name.rsplit('.').next().unwrap_or(&self.name),
        }
    }

    /// Render as `` `name` `` or `` `name` AS `alias` ``.
    pub fn to_sql(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{} AS {}", quote_table(&self.name), quote_ident(alias)),
            None => quote_table(&self.name),
        }
    }
}

/// Quote a possibly schema-qualified table name (`db.table` → `` `db`.`table` ``).
pub fn quote_table(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, part) in name.split('.').enumerate() {
        if i > 0 {
            out.push('.');
        }
        write_quoted(&mut out, part);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_escapes_backticks() {
        assert_eq!(quote_ident("user"), "`user`");
        assert_eq!(quote_ident("we`ird"), "`we``ird`");
    }

    #[test]
    fn qualify_rules() {
        assert_eq!(qualify(Some("user"), "age"), "`user`.`age`");
        assert_eq!(qualify(None, "age"), "`age`");
        assert_eq!(qualify(Some("user"), "*"), "`user`.*");
        assert_eq!(qualify(None, "*"), "*");
        assert_eq!(qualify(Some("user"), "p.title"), "`p`.`title`");
        assert_eq!(qualify(Some("user"), "p.*"), "`p`.*");
    }

    #[test]
    fn field_placeholders() {
        assert_eq!(field("age", None), "{age}");
        assert_eq!(field("age", Some("p")), "{p.age}");
        assert_eq!(field("u.age", Some("p")), "{u.age}");
        assert_eq!(field("!COUNT(*)", None), "COUNT(*)");
        assert_eq!(field("{x.y}", None), "{x.y}");
    }

    #[test]
    fn map_qualifiers_replaces_all() {
        assert_eq!(
            map_qualifiers("{a} = ? AND {p.b} > {c}", Some("t")),
            "`t`.`a` = ? AND `p`.`b` > `t`.`c`"
        );
        assert_eq!(map_qualifiers("no braces", Some("t")), "no braces");
        assert_eq!(map_qualifiers("open { only", Some("t")), "open { only");
    }

    #[test]
    fn table_ref_parsing() {
        assert_eq!(TableRef::parse("user").to_sql(), "`user`");
        assert_eq!(TableRef::parse("user u").to_sql(), "`user` AS `u`");
        assert_eq!(TableRef::parse("user AS u").qualifier(), "u");
        assert_eq!(TableRef::parse("shop.user").to_sql(), "`shop`.`user`");
        assert_eq!(TableRef::parse("shop.user").qualifier(), "user");
        assert_eq!(TableRef::parse("user").qualifier(), "user");
    }
}
