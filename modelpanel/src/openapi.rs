//! Runtime OpenAPI description of the materialized JSON routes.
//!
//! The admin routes are described statically by `utoipa`; model routes only
//! exist after registration, so their paths and record schemas are appended to
//! a copy of the static document on every request for it.

use crate::field::FieldKind;
use crate::model::ModelDefinition;
use crate::users::USER_QUERY_PARAM;
use std::sync::Arc;
use utoipa::openapi::path::{HttpMethod, Operation, OperationBuilder, ParameterBuilder, ParameterIn};
use utoipa::openapi::request_body::RequestBodyBuilder;
use utoipa::openapi::schema::{ArrayBuilder, ObjectBuilder, Type};
use utoipa::openapi::{Components, ContentBuilder, OpenApi, Ref, RefOr, Required, ResponseBuilder, Schema};

fn scalar(schema_type: Type) -> ObjectBuilder {
    ObjectBuilder::new().schema_type(schema_type)
}

fn field_type(kind: FieldKind) -> Type {
    match kind {
        FieldKind::String => Type::String,
        FieldKind::Number => Type::Number,
        FieldKind::Boolean => Type::Boolean,
    }
}

/// Component name of a model's record schema; the prefix keeps it clear of
/// the static admin schemas.
pub fn record_schema_name(model: &ModelDefinition) -> String {
    format!("Record_{}", model.name)
}

/// Record schema of one model: `id` plus one property per declared field.
pub fn record_schema(model: &ModelDefinition) -> RefOr<Schema> {
    let mut object = ObjectBuilder::new()
        .schema_type(Type::Object)
        .property("id", scalar(Type::String).description(Some("UUID v4 assigned on create")))
        .required("id");
    for field in &model.fields {
        object = object.property(&field.name, scalar(field_type(field.kind)));
        if field.required {
            object = object.required(&field.name);
        }
    }
    if let Some(owner) = model.owner_field.as_deref().filter(|o| model.field(o).is_none()) {
        object = object.property(owner, scalar(Type::String).description(Some("Id of the creating user")));
    }
    object.into()
}

fn json_content(schema: impl Into<RefOr<Schema>>) -> utoipa::openapi::Content {
    ContentBuilder::new().schema(Some(schema)).build()
}

fn operation(model: &ModelDefinition, id: &str, summary: String) -> OperationBuilder {
    OperationBuilder::new()
        .tags(Some(vec![model.name.clone()]))
        .operation_id(Some(format!("{}_{}", model.table_name, id)))
        .summary(Some(summary))
        .parameter(
            ParameterBuilder::new()
                .name(USER_QUERY_PARAM)
                .parameter_in(ParameterIn::Query)
                .required(Required::False)
                .description(Some("Username of the acting user"))
                .schema(Some(scalar(Type::String))),
        )
}

fn with_id(op: OperationBuilder) -> OperationBuilder {
    op.parameter(
        ParameterBuilder::new()
            .name("id")
            .parameter_in(ParameterIn::Path)
            .required(Required::True)
            .schema(Some(scalar(Type::String))),
    )
}

fn with_body(op: OperationBuilder, record: &Ref) -> OperationBuilder {
    op.request_body(Some(
        RequestBodyBuilder::new()
            .content("application/json", json_content(record.clone()))
            .required(Some(Required::True))
            .build(),
    ))
}

fn responds(op: OperationBuilder, status: &str, description: &str, body: Option<RefOr<Schema>>) -> OperationBuilder {
    let mut response = ResponseBuilder::new().description(description);
    if let Some(body) = body {
        response = response.content("application/json", json_content(body));
    }
    op.response(status, response.build())
}

fn denied(op: OperationBuilder) -> OperationBuilder {
    let error = Ref::from_schema_name("ErrorResponse");
    responds(op, "403", "Denied by role permissions or ownership", Some(error.into()))
}

fn model_operations(model: &ModelDefinition) -> Vec<(String, HttpMethod, Operation)> {
    let record = Ref::from_schema_name(record_schema_name(model));
    let collection = format!("/api/{}", model.table_name);
    let single = format!("/api/{}/{{id}}", model.table_name);
    let name = &model.name;

    let list = responds(
        operation(model, "list", format!("List {name} records")),
        "200",
        "All records",
        Some(ArrayBuilder::new().items(record.clone()).into()),
    );
    let create = responds(with_body(operation(model, "create", format!("Create a {name}")), &record), "201", "Created record", Some(record.clone().into()));
    let create = responds(create, "400", "Input does not match the field types", None);
    let show = responds(with_id(operation(model, "show", format!("Fetch one {name}"))), "200", "The record", Some(record.clone().into()));
    let show = responds(show, "404", "Record not found", None);
    let update = responds(
        with_body(with_id(operation(model, "update", format!("Update a {name}"))), &record),
        "200",
        "Updated record",
        Some(record.clone().into()),
    );
    let update = responds(update, "404", "Record not found", None);
    let delete = responds(with_id(operation(model, "delete", format!("Delete a {name}"))), "204", "Deleted, or never existed", None);

    vec![
        (collection.clone(), HttpMethod::Get, denied(list).build()),
        (collection, HttpMethod::Post, denied(create).build()),
        (single.clone(), HttpMethod::Get, denied(show).build()),
        (single.clone(), HttpMethod::Put, denied(update).build()),
        (single, HttpMethod::Delete, denied(delete).build()),
    ]
}

/// The static document extended with every registered model.
pub fn document(base: &OpenApi, models: &[Arc<ModelDefinition>]) -> OpenApi {
    let mut doc = base.clone();
    for model in models {
        for (path, method, op) in model_operations(model) {
            doc.paths.add_path_operation(path, vec![method], op);
        }
        doc.components.get_or_insert_with(Components::new).schemas.insert(record_schema_name(model), record_schema(model));
    }
    doc
}
