//! Schema reflection
//!
//! Pure, cache-free derivation of SQL identifiers and DDL from model
//! metadata. Everything here is re-derivable on every call so query
//! descriptors can be copied freely.

use crate::error::QueryError;
use crate::model::Model;

/// Fixed key-to-identifier transformation: `compareNumber1` -> `compare_number1`.
pub fn camel_to_snake(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, ch) in key.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Double-quote an identifier, escaping embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Bare table identifier for a model (snake-cased, unqualified, unquoted).
pub fn sql_name(model: &Model) -> String {
    camel_to_snake(model.name())
}

/// Schema-qualified, identifier-quoted table name: `public."my_model"`.
pub fn table_name(model: &Model) -> String {
    format!("public.{}", quote_ident(&sql_name(model)))
}

/// A column reference under a query alias: `"<alias>"."<column>"`.
pub fn qualified_column(alias: &str, key: &str) -> String {
    format!("{}.{}", quote_ident(alias), quote_ident(&camel_to_snake(key)))
}

/// An unqualified column reference, used where no alias is in scope
/// (index expressions).
pub fn column_name(key: &str) -> String {
    quote_ident(&camel_to_snake(key))
}

/// CREATE TABLE statement for a model.
pub fn create_table_sql(model: &Model) -> String {
    let columns = model
        .fields()
        .map(|(key, field)| {
            format!(
                "{} {} {}",
                column_name(key),
                field.sql_type.base_type,
                field.sql_type.modifiers.join(" ")
            )
        })
        .collect::<Vec<_>>()
        .join(",\n");

    format!("CREATE TABLE {} (\n{}\n);", table_name(model), columns)
}

/// One ALTER TABLE … FOREIGN KEY statement per reference field.
pub fn foreign_keys_sql(model: &Model) -> Result<Vec<String>, QueryError> {
    let mut statements = Vec::new();
    for (key, field) in model.fields() {
        let Some(references) = &field.references else {
            continue;
        };
        // The referenced column must still exist on the target model.
        references.model.field(&references.column)?;
        let constraint = quote_ident(&format!(
            "fk__{}_{}__{}_{}",
            sql_name(model),
            camel_to_snake(key),
            sql_name(&references.model),
            camel_to_snake(&references.column)
        ));
        statements.push(format!(
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY({}) REFERENCES {}({})",
            table_name(model),
            constraint,
            column_name(key),
            table_name(&references.model),
            column_name(&references.column)
        ));
    }
    Ok(statements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{self, Model};

    #[test]
    fn camel_to_snake_handles_leading_and_embedded_caps() {
        assert_eq!(camel_to_snake("compareNumber1"), "compare_number1");
        assert_eq!(camel_to_snake("Project"), "project");
        assert_eq!(camel_to_snake("name"), "name");
    }

    #[test]
    fn table_and_column_names_are_quoted() {
        let model = Model::new("UserAccount", vec![("id", model::generated_id())]);
        assert_eq!(table_name(&model), "public.\"user_account\"");
        assert_eq!(qualified_column("q1", "firstName"), "\"q1\".\"first_name\"");
    }

    #[test]
    fn create_table_lists_columns_in_declaration_order() {
        let model = Model::new(
            "Widget",
            vec![
                ("id", model::generated_id()),
                ("label", model::text()),
                ("weight", model::optional(model::integer())),
            ],
        );

        let sql = create_table_sql(&model);
        assert_eq!(
            sql,
            "CREATE TABLE public.\"widget\" (\n\
             \"id\" uuid NOT NULL DEFAULT public.uuid_generate_v4() PRIMARY KEY,\n\
             \"label\" text NOT NULL,\n\
             \"weight\" integer \n\
             );"
        );
    }

    #[test]
    fn foreign_keys_emit_one_constraint_per_reference() {
        let user = Model::new(
            "User",
            vec![("id", model::generated_id()), ("name", model::text())],
        );
        let project = Model::new(
            "Project",
            vec![
                ("id", model::generated_id()),
                ("user", model::reference(&user, "id").unwrap()),
            ],
        );

        let statements = foreign_keys_sql(&project).unwrap();
        assert_eq!(statements.len(), 1);
        assert_eq!(
            statements[0],
            "ALTER TABLE public.\"project\" ADD CONSTRAINT \"fk__project_user__user_id\" \
             FOREIGN KEY(\"user\") REFERENCES public.\"user\"(\"id\")"
        );
    }
}
