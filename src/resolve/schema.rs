//! Schema-backed mapping resolver.
//!
//! A [`MappingSchema`] describes entities, their columns and relations, and
//! is usually loaded from TOML:
//!
//! ```toml
//! [[entities]]
//! name = "Customer"
//! table = "Customers"
//! columns = [
//!     { member = "ID", type = "int32", primary_key = true },
//!     { member = "Name", type = "string", nullable = true },
//! ]
//! relations = [
//!     { member = "Orders", target = "Order", local_key = "ID", foreign_key = "CustomerID", cardinality = "many" },
//! ]
//! ```

use super::identifiers::UniqueIdentifierGenerator;
use super::resolver::MappingResolver;
use crate::error::{CompileError, CompileResult};
use crate::query::{Value, ValueType};
use crate::sql::{
    JoinInfo, ResolvedJoinInfo, SimpleTableInfo, SqlColumn, SqlEntity, SqlExpr, TableInfo,
    UnresolvedJoinInfo, UnresolvedTableInfo,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use strsim::levenshtein;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub member: String,
    /// Defaults to the member name.
    #[serde(default)]
    pub column: Option<String>,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
}

impl ColumnMapping {
    pub fn column_name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.member)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationCardinality {
    One,
    Many,
}

/// Navigation member. Keys are member names: `local_key` on the declaring
/// entity, `foreign_key` on the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationMapping {
    pub member: String,
    pub target: String,
    pub local_key: String,
    pub foreign_key: String,
    pub cardinality: RelationCardinality,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMapping {
    pub name: String,
    /// Table name; inherited from `base` when omitted.
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub discriminator_column: Option<String>,
    #[serde(default)]
    pub discriminator_value: Option<String>,
    #[serde(default)]
    pub columns: Vec<ColumnMapping>,
    #[serde(default)]
    pub relations: Vec<RelationMapping>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingSchema {
    #[serde(default)]
    pub entities: Vec<EntityMapping>,
}

impl MappingSchema {
    pub fn from_toml_str(source: &str) -> CompileResult<Self> {
        let schema: MappingSchema =
            toml::from_str(source).map_err(|e| CompileError::Config(format!("Invalid mapping schema: {}", e)))?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn load(path: impl AsRef<Path>) -> CompileResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn entity(&self, name: &str) -> Option<&EntityMapping> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// Checks base entities, relation targets and column types.
    pub fn validate(&self) -> CompileResult<()> {
        for entity in &self.entities {
            if let Some(base) = &entity.base {
                if self.entity(base).is_none() {
                    return Err(CompileError::Config(format!(
                        "Entity '{}' derives from unknown entity '{}'",
                        entity.name, base
                    )));
                }
            }
            for column in &entity.columns {
                column.ty.parse::<ValueType>().map_err(|e| {
                    CompileError::Config(format!("{}.{}: {}", entity.name, column.member, e))
                })?;
            }
            for relation in &entity.relations {
                if self.entity(&relation.target).is_none() {
                    return Err(CompileError::Config(format!(
                        "Relation '{}.{}' targets unknown entity '{}'",
                        entity.name, relation.member, relation.target
                    )));
                }
            }
        }
        if let Some(entity) = self.entities.iter().find(|e| self.table_of(e).is_none()) {
            return Err(CompileError::Config(format!(
                "Entity '{}' has no table and no base entity with a table",
                entity.name
            )));
        }
        Ok(())
    }

    /// `entity` followed by its base entities. Stops on a cycle.
    fn chain<'a>(&'a self, entity: &'a EntityMapping) -> Vec<&'a EntityMapping> {
        let mut chain = vec![entity];
        let mut current = entity;
        while let Some(base) = current.base.as_deref().and_then(|b| self.entity(b)) {
            if chain.iter().any(|e| e.name == base.name) {
                break;
            }
            chain.push(base);
            current = base;
        }
        chain
    }

    fn root<'a>(&'a self, entity: &'a EntityMapping) -> &'a EntityMapping {
        self.chain(entity).last().copied().unwrap_or(entity)
    }

    fn table_of<'a>(&'a self, entity: &'a EntityMapping) -> Option<&'a str> {
        self.chain(entity).into_iter().find_map(|e| e.table.as_deref())
    }

    /// Whether `derived` is `base` or inherits from it.
    fn derives_from(&self, derived: &EntityMapping, base: &str) -> bool {
        self.chain(derived).iter().any(|e| e.name == base)
    }

    /// Every entity stored in the same hierarchy as `entity`.
    fn hierarchy<'a>(&'a self, entity: &'a EntityMapping) -> Vec<&'a EntityMapping> {
        let root = &self.root(entity).name;
        self.entities
            .iter()
            .filter(|e| self.derives_from(e, root))
            .collect()
    }

    fn find_column<'a>(&'a self, entity: &'a EntityMapping, member: &str) -> Option<&'a ColumnMapping> {
        self.chain(entity)
            .into_iter()
            .flat_map(|e| e.columns.iter())
            .find(|c| c.member == member)
    }

    fn find_relation<'a>(&'a self, entity: &'a EntityMapping, member: &str) -> Option<&'a RelationMapping> {
        self.chain(entity)
            .into_iter()
            .flat_map(|e| e.relations.iter())
            .find(|r| r.member == member)
    }
}

/// Dynamic threshold based on length, as for identifier typos elsewhere.
fn did_you_mean<'a>(input: &str, candidates: impl Iterator<Item = &'a str>) -> Option<String> {
    let threshold = match input.len() {
        0..=2 => 0,
        3..=5 => 2,
        _ => 3,
    };
    candidates
        .map(|c| (levenshtein(input, c), c))
        .filter(|(dist, _)| *dist <= threshold)
        .min_by_key(|(dist, _)| *dist)
        .map(|(_, c)| c.to_string())
}

fn with_suggestion(message: String, suggestion: Option<String>) -> String {
    match suggestion {
        Some(s) => format!("{}. Did you mean '{}'?", message, s),
        None => format!("{}.", message),
    }
}

fn column_type(column: &ColumnMapping) -> ValueType {
    let ty = column.ty.parse::<ValueType>().unwrap_or(ValueType::Object);
    if column.nullable { ty.nullable() } else { ty }
}

/// [`MappingResolver`] over a [`MappingSchema`].
#[derive(Debug, Clone)]
pub struct SchemaResolver {
    schema: MappingSchema,
    primary_keys: HashMap<String, String>,
}

impl SchemaResolver {
    pub fn new(schema: MappingSchema) -> Self {
        let primary_keys = schema
            .entities
            .iter()
            .filter_map(|e| {
                schema
                    .chain(e)
                    .into_iter()
                    .flat_map(|c| c.columns.iter())
                    .find(|c| c.primary_key)
                    .map(|c| (e.name.clone(), c.column_name().to_string()))
            })
            .collect();
        Self { schema, primary_keys }
    }

    pub fn schema(&self) -> &MappingSchema {
        &self.schema
    }

    fn entity(&self, ty: &ValueType) -> CompileResult<&EntityMapping> {
        let name = ty
            .entity_name()
            .ok_or_else(|| CompileError::UnmappedItem(format!("The type '{}' is not an entity type", ty)))?;
        self.schema.entity(name).ok_or_else(|| {
            let suggestion = did_you_mean(name, self.schema.entities.iter().map(|e| e.name.as_str()));
            CompileError::UnmappedItem(with_suggestion(
                format!("The type '{}' is not mapped", name),
                suggestion,
            ))
        })
    }

    fn unmapped_member(&self, mapping: &EntityMapping, member: &str) -> CompileError {
        let chain = self.schema.chain(mapping);
        let candidates = chain.into_iter().flat_map(|e| {
            e.columns
                .iter()
                .map(|c| c.member.as_str())
                .chain(e.relations.iter().map(|r| r.member.as_str()))
        });
        let suggestion = did_you_mean(member, candidates);
        CompileError::UnmappedItem(with_suggestion(
            format!("The member '{}.{}' is not mapped", mapping.name, member),
            suggestion,
        ))
    }

    fn entity_column(&self, entity: &SqlEntity, mapping: &EntityMapping, member: &str) -> CompileResult<SqlColumn> {
        let column = self
            .schema
            .find_column(mapping, member)
            .ok_or_else(|| self.unmapped_member(mapping, member))?;
        entity.column(column.column_name()).cloned().ok_or_else(|| {
            CompileError::UnmappedItem(format!(
                "The column '{}' of '{}' is not available through [{}]",
                column.column_name(),
                mapping.name,
                entity.table_alias
            ))
        })
    }
}

impl MappingResolver for SchemaResolver {
    fn resolve_table_info(
        &self,
        info: &UnresolvedTableInfo,
        generator: &mut UniqueIdentifierGenerator,
    ) -> CompileResult<TableInfo> {
        let mapping = self.entity(&info.item_type)?;
        let table_name = self.schema.table_of(mapping).ok_or_else(|| {
            CompileError::UnmappedItem(format!("The type '{}' has no table", mapping.name))
        })?;
        Ok(TableInfo::Simple(SimpleTableInfo {
            item_type: info.item_type.clone(),
            table_name: table_name.to_string(),
            alias: generator.table_alias(),
        }))
    }

    fn resolve_simple_table(&self, info: &SimpleTableInfo) -> CompileResult<SqlEntity> {
        let mapping = self.entity(&info.item_type)?;
        let primary_key_name = self.primary_keys.get(&mapping.name).ok_or_else(|| {
            CompileError::UnmappedItem(format!("The type '{}' has no primary key", mapping.name))
        })?;

        // All entities of a hierarchy share one table: expose every column of
        // it so that members of derived types resolve after a cast.
        let hierarchy = self.schema.hierarchy(mapping);
        let mut columns: Vec<SqlColumn> = Vec::new();
        let ordered = self
            .schema
            .chain(mapping)
            .into_iter()
            .rev()
            .chain(hierarchy.into_iter().filter(|e| !self.schema.derives_from(mapping, &e.name)));
        for entity in ordered {
            for column in &entity.columns {
                if columns.iter().all(|c| c.name != column.column_name()) {
                    columns.push(SqlColumn::definition(
                        column_type(column),
                        &info.alias,
                        column.column_name(),
                        column.primary_key,
                    ));
                }
            }
        }
        if let Some(discriminator) = self.schema.root(mapping).discriminator_column.as_deref() {
            if columns.iter().all(|c| c.name != discriminator) {
                columns.push(SqlColumn::definition(ValueType::String, &info.alias, discriminator, false));
            }
        }

        let primary_key = columns
            .iter()
            .find(|c| &c.name == primary_key_name)
            .cloned()
            .ok_or_else(|| CompileError::UnmappedItem(format!("The type '{}' has no primary key", mapping.name)))?;
        Ok(SqlEntity::definition(
            info.item_type.clone(),
            &info.alias,
            primary_key,
            columns,
        ))
    }

    fn resolve_join_info(
        &self,
        info: &UnresolvedJoinInfo,
        generator: &mut UniqueIdentifierGenerator,
    ) -> CompileResult<JoinInfo> {
        let mapping = self.entity(&info.originating.ty)?;
        let relation = self
            .schema
            .find_relation(mapping, &info.member)
            .ok_or_else(|| self.unmapped_member(mapping, &info.member))?;
        let target_type = ValueType::entity(relation.target.clone());
        let target = self.entity(&target_type)?;

        let left_key = self.entity_column(&info.originating, mapping, &relation.local_key)?;
        let foreign_column = self
            .schema
            .find_column(target, &relation.foreign_key)
            .ok_or_else(|| self.unmapped_member(target, &relation.foreign_key))?;

        let foreign = self.resolve_table_info(
            &UnresolvedTableInfo {
                item_type: target_type,
            },
            generator,
        )?;
        let foreign_alias = foreign.alias().unwrap_or_default().to_string();
        let right_key = SqlColumn::definition(
            column_type(foreign_column),
            &foreign_alias,
            foreign_column.column_name(),
            foreign_column.primary_key,
        );

        Ok(JoinInfo::Resolved(ResolvedJoinInfo {
            foreign: Box::new(foreign),
            left_key: SqlExpr::Column(left_key),
            right_key: SqlExpr::Column(right_key),
        }))
    }

    fn resolve_member(&self, entity: &SqlEntity, member: &str) -> CompileResult<SqlExpr> {
        let mapping = self.entity(&entity.ty)?;

        if self.schema.find_column(mapping, member).is_some() {
            let column = self.entity_column(entity, mapping, member)?;
            return Ok(if column.ty.is_bool() {
                SqlExpr::BooleanConversion(Box::new(SqlExpr::Column(column)))
            } else {
                SqlExpr::Column(column)
            });
        }

        let relation = self
            .schema
            .find_relation(mapping, member)
            .ok_or_else(|| self.unmapped_member(mapping, member))?;
        match relation.cardinality {
            RelationCardinality::One => Ok(SqlExpr::EntityRefMember {
                entity: Box::new(entity.clone()),
                member: member.to_string(),
                ty: ValueType::entity(relation.target.clone()),
            }),
            RelationCardinality::Many => Err(CompileError::unsupported(
                format!("{}.{}", mapping.name, member),
                format!(
                    "The collection member '{}.{}' can only be used as a query source",
                    mapping.name, member
                ),
            )),
        }
    }

    fn resolve_constant(&self, value: &Value, ty: &ValueType) -> CompileResult<SqlExpr> {
        match value {
            Value::Entity { entity, key } => {
                let mapping = self.entity(&ValueType::entity(entity.clone()))?;
                let key_type = self
                    .schema
                    .chain(mapping)
                    .into_iter()
                    .flat_map(|e| e.columns.iter())
                    .find(|c| c.primary_key)
                    .map(column_type)
                    .ok_or_else(|| {
                        CompileError::UnmappedItem(format!("The type '{}' has no primary key", mapping.name))
                    })?;
                Ok(SqlExpr::EntityConstant {
                    ty: ty.clone(),
                    value: value.clone(),
                    primary_key: Box::new(SqlExpr::constant((**key).clone(), key_type)),
                })
            }
            other => Ok(SqlExpr::constant(other.clone(), ty.clone())),
        }
    }

    fn resolve_type_check(&self, operand: &SqlExpr, target: &ValueType) -> CompileResult<SqlExpr> {
        let SqlExpr::Entity(entity) = operand else {
            return Ok(SqlExpr::bool_literal(operand.ty() == *target));
        };
        let actual = self.entity(&entity.ty)?;
        let wanted = self.entity(target)?;

        if self.schema.derives_from(actual, &wanted.name) {
            return Ok(SqlExpr::bool_literal(true));
        }
        if !self.schema.derives_from(wanted, &actual.name) {
            return Ok(SqlExpr::bool_literal(false));
        }

        let root = self.schema.root(actual);
        let discriminator = root.discriminator_column.as_deref().ok_or_else(|| {
            CompileError::UnmappedItem(format!(
                "Cannot check for type '{}': the hierarchy of '{}' has no discriminator column",
                wanted.name, root.name
            ))
        })?;
        let column = entity.column(discriminator).cloned().ok_or_else(|| {
            CompileError::UnmappedItem(format!(
                "The discriminator column '{}' is not available through [{}]",
                discriminator, entity.table_alias
            ))
        })?;

        let values: Vec<&str> = self
            .schema
            .entities
            .iter()
            .filter(|e| self.schema.derives_from(e, &wanted.name))
            .filter_map(|e| e.discriminator_value.as_deref())
            .collect();
        if values.is_empty() {
            return Err(CompileError::UnmappedItem(format!(
                "The type '{}' has no discriminator value",
                wanted.name
            )));
        }

        let check = values
            .into_iter()
            .map(|v| SqlExpr::equal(SqlExpr::Column(column.clone()), SqlExpr::constant(v, ValueType::String)))
            .reduce(SqlExpr::or);
        check.ok_or_else(|| CompileError::UnmappedItem(format!("The type '{}' has no discriminator value", wanted.name)))
    }
}

#[cfg(test)]
pub(crate) const TEST_SCHEMA: &str = r#"
[[entities]]
name = "Customer"
table = "Customers"
columns = [
    { member = "ID", type = "int32", primary_key = true },
    { member = "Name", type = "string", nullable = true },
    { member = "City", type = "string", nullable = true },
    { member = "Age", type = "int32", nullable = true },
    { member = "IsActive", type = "bool" },
]
relations = [
    { member = "Orders", target = "Order", local_key = "ID", foreign_key = "CustomerID", cardinality = "many" },
]

[[entities]]
name = "Order"
table = "Orders"
columns = [
    { member = "ID", type = "int32", primary_key = true },
    { member = "CustomerID", type = "int32", nullable = true },
    { member = "Total", type = "decimal" },
]
relations = [
    { member = "Customer", target = "Customer", local_key = "CustomerID", foreign_key = "ID", cardinality = "one" },
]

[[entities]]
name = "Person"
table = "People"
discriminator_column = "Kind"
discriminator_value = "P"
columns = [
    { member = "ID", type = "int32", primary_key = true },
    { member = "Name", type = "string" },
]

[[entities]]
name = "Employee"
base = "Person"
discriminator_value = "E"
columns = [
    { member = "Salary", type = "decimal" },
]
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn resolver() -> SchemaResolver {
        SchemaResolver::new(MappingSchema::from_toml_str(TEST_SCHEMA).unwrap())
    }

    fn simple(resolver: &SchemaResolver, entity: &str) -> SqlEntity {
        let mut generator = UniqueIdentifierGenerator::default();
        let info = resolver
            .resolve_table_info(
                &UnresolvedTableInfo {
                    item_type: ValueType::entity(entity),
                },
                &mut generator,
            )
            .unwrap();
        let TableInfo::Simple(info) = info else {
            panic!("expected a simple table");
        };
        resolver.resolve_simple_table(&info).unwrap()
    }

    #[test]
    fn test_table_info_gets_fresh_alias() {
        let resolver = resolver();
        let mut generator = UniqueIdentifierGenerator::default();
        let info = UnresolvedTableInfo {
            item_type: ValueType::entity("Customer"),
        };
        let first = resolver.resolve_table_info(&info, &mut generator).unwrap();
        let second = resolver.resolve_table_info(&info, &mut generator).unwrap();
        assert_eq!(first.alias(), Some("t0"));
        assert_eq!(second.alias(), Some("t1"));
    }

    #[test]
    fn test_member_typo_suggests_member() {
        let resolver = resolver();
        let customer = simple(&resolver, "Customer");
        let err = resolver.resolve_member(&customer, "Nmae").unwrap_err();
        assert_eq!(
            err.to_string(),
            "The member 'Customer.Nmae' is not mapped. Did you mean 'Name'?"
        );
    }

    #[test]
    fn test_unknown_type_suggests_entity() {
        let resolver = resolver();
        let mut generator = UniqueIdentifierGenerator::default();
        let err = resolver
            .resolve_table_info(
                &UnresolvedTableInfo {
                    item_type: ValueType::entity("Custmer"),
                },
                &mut generator,
            )
            .unwrap_err();
        assert!(matches!(err, CompileError::UnmappedItem(_)));
        assert!(err.to_string().contains("Did you mean 'Customer'?"));
    }

    #[test]
    fn test_bool_column_is_marked() {
        let resolver = resolver();
        let customer = simple(&resolver, "Customer");
        assert!(matches!(
            resolver.resolve_member(&customer, "IsActive").unwrap(),
            SqlExpr::BooleanConversion(_)
        ));
    }

    #[test]
    fn test_to_one_relation_is_entity_ref() {
        let resolver = resolver();
        let order = simple(&resolver, "Order");
        assert!(matches!(
            resolver.resolve_member(&order, "Customer").unwrap(),
            SqlExpr::EntityRefMember { .. }
        ));
    }

    #[test]
    fn test_derived_type_shares_table() {
        let resolver = resolver();
        let person = simple(&resolver, "Person");
        let names: Vec<&str> = person.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["ID", "Name", "Salary", "Kind"]);
    }

    #[test]
    fn test_type_check_uses_discriminator() {
        let resolver = resolver();
        let person = SqlExpr::Entity(simple(&resolver, "Person"));
        let check = resolver
            .resolve_type_check(&person, &ValueType::entity("Employee"))
            .unwrap();
        let SqlExpr::Binary { right, .. } = check else {
            panic!("expected a discriminator comparison");
        };
        assert_eq!(*right, SqlExpr::constant("E", ValueType::String));

        let always = resolver
            .resolve_type_check(&person, &ValueType::entity("Person"))
            .unwrap();
        assert_eq!(always, SqlExpr::bool_literal(true));
    }

    #[test]
    fn test_entity_constant_boxes_key() {
        let resolver = resolver();
        let value = Value::Entity {
            entity: "Customer".to_string(),
            key: Box::new(Value::Int(5)),
        };
        let resolved = resolver.resolve_constant(&value, &ValueType::entity("Customer")).unwrap();
        let SqlExpr::EntityConstant { primary_key, .. } = resolved else {
            panic!("expected an entity constant");
        };
        assert_eq!(*primary_key, SqlExpr::constant(5, ValueType::Int32));
    }

    #[test]
    fn test_relation_to_unknown_entity_is_rejected() {
        let err = MappingSchema::from_toml_str(
            r#"
[[entities]]
name = "A"
table = "A"
relations = [{ member = "B", target = "Bee", local_key = "ID", foreign_key = "ID", cardinality = "one" }]
"#,
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::Config(_)));
    }
}
