pub mod field;
pub mod rules;

use std::collections::{BTreeSet, HashMap, VecDeque};

use tracing::{debug, warn};

use crate::errors::ConfigurationError;
use crate::reference::{RawTable, ReferenceTable};

pub use field::{FieldDefinition, FieldId, FieldRole, NumericRule, Section, ValueSource};
pub use rules::{classify_role, classify_section};

const ID_COLUMNS: &[&str] = &["field", "field id", "field_id", "id"];
const LABEL_COLUMNS: &[&str] = &["label"];
const SECTION_COLUMNS: &[&str] = &["section", "tab"];
const ANNOTATION_COLUMNS: &[&str] = &["source", "logic", "source/logic", "annotation"];
const DEPENDS_ON_COLUMNS: &[&str] = &["depends on", "depends_on", "dependson"];

/// Static field configuration: every input, computed and summary field plus the
/// dependency graph between them, validated and topologically ordered once.
#[derive(Clone, Debug)]
pub struct FieldSchema {
    fields: Vec<FieldDefinition>,
    index: HashMap<FieldId, usize>,
    dependents: Vec<Vec<usize>>,
    order: Vec<usize>,
}

struct SchemaColumns {
    id: usize,
    label: Option<usize>,
    section: usize,
    annotation: Option<usize>,
    depends_on: Option<usize>,
}

impl SchemaColumns {
    fn resolve(table: &ReferenceTable) -> Result<Self, ConfigurationError> {
        let required = |candidates: &[&str], what: &str| {
            find_column(table, candidates).ok_or_else(|| {
                ConfigurationError::MalformedSchema(format!(
                    "missing {what} column (expected one of: {})",
                    candidates.join(", ")
                ))
            })
        };

        Ok(Self {
            id: required(ID_COLUMNS, "field identifier")?,
            label: find_column(table, LABEL_COLUMNS),
            section: required(SECTION_COLUMNS, "section")?,
            annotation: find_column(table, ANNOTATION_COLUMNS),
            depends_on: find_column(table, DEPENDS_ON_COLUMNS),
        })
    }
}

impl FieldSchema {
    /// Builds the schema from a UI-config table, one row per field.
    pub fn parse(raw: RawTable) -> Result<Self, ConfigurationError> {
        let table = ReferenceTable::from_raw(raw);
        let columns = SchemaColumns::resolve(&table)?;
        let mut definitions = Vec::with_capacity(table.row_count());

        for row in 0..table.row_count() {
            let Some(id) = non_empty(&table, row, Some(columns.id)) else {
                continue;
            };
            let label = non_empty(&table, row, columns.label).unwrap_or(id);
            let section_text = non_empty(&table, row, Some(columns.section)).unwrap_or_default();
            let annotation = non_empty(&table, row, columns.annotation);

            let section = classify_section(section_text);
            if section == Section::Unclassified {
                warn!(
                    event_name = "schema.field_unclassified",
                    field = id,
                    section = section_text,
                    "field section not recognised; the field will not be rendered"
                );
            }

            let mut definition =
                FieldDefinition::new(id, label, section, classify_role(label, annotation));
            definition.annotation = annotation.map(str::to_string);
            if let Some(list) = non_empty(&table, row, columns.depends_on) {
                for dependency in list.split([';', ',']).map(str::trim).filter(|d| !d.is_empty()) {
                    definition = definition.with_dependency(dependency);
                }
            }
            definitions.push(definition);
        }

        Self::from_definitions(with_implicit_dependencies(definitions))
    }

    /// Validates ids and dependencies as given; no implicit dependencies are added.
    pub fn from_definitions(fields: Vec<FieldDefinition>) -> Result<Self, ConfigurationError> {
        let mut index = HashMap::with_capacity(fields.len());
        for (position, field) in fields.iter().enumerate() {
            if index.insert(field.id.clone(), position).is_some() {
                return Err(ConfigurationError::DuplicateField(field.id.clone()));
            }
        }

        let mut dependencies = Vec::with_capacity(fields.len());
        for field in &fields {
            let mut resolved = Vec::with_capacity(field.depends_on.len());
            for dependency in &field.depends_on {
                let position = *index.get(dependency).ok_or_else(|| {
                    ConfigurationError::UnknownDependency {
                        field: field.id.clone(),
                        dependency: dependency.clone(),
                    }
                })?;
                if !resolved.contains(&position) {
                    resolved.push(position);
                }
            }
            dependencies.push(resolved);
        }

        let mut dependents = vec![Vec::new(); fields.len()];
        for (field, field_dependencies) in dependencies.iter().enumerate() {
            for &dependency in field_dependencies {
                dependents[dependency].push(field);
            }
        }

        let order = topological_order(&fields, &dependencies, &dependents)?;
        debug!(event_name = "schema.loaded", fields = fields.len(), "field schema loaded");

        Ok(Self { fields, index, dependents, order })
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn field(&self, id: &str) -> Option<&FieldDefinition> {
        self.index.get(&FieldId::from(id)).map(|position| &self.fields[*position])
    }

    pub fn field_for_role(&self, role: FieldRole) -> Option<&FieldDefinition> {
        self.fields.iter().find(|field| field.role == role)
    }

    pub fn list_fields_by_section(&self, section: Section) -> Vec<&FieldDefinition> {
        self.fields.iter().filter(|field| field.section == section).collect()
    }

    /// Every field, dependencies before dependents.
    pub fn topological_order(&self) -> impl Iterator<Item = &FieldDefinition> + '_ {
        self.order.iter().map(|position| &self.fields[*position])
    }

    /// Transitive dependents of `id`, in topological order, excluding `id` itself.
    pub fn dependents_of(&self, id: &FieldId) -> Vec<&FieldDefinition> {
        let Some(&start) = self.index.get(id) else {
            return Vec::new();
        };

        let mut reached = BTreeSet::new();
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            for &dependent in &self.dependents[current] {
                if reached.insert(dependent) {
                    queue.push_back(dependent);
                }
            }
        }

        self.order
            .iter()
            .filter(|position| **position != start && reached.contains(*position))
            .map(|position| &self.fields[*position])
            .collect()
    }
}

fn find_column(table: &ReferenceTable, candidates: &[&str]) -> Option<usize> {
    table.columns().iter().position(|column| {
        let column = column.to_lowercase();
        let compact = column.split_whitespace().collect::<String>();
        candidates.iter().any(|candidate| *candidate == column || *candidate == compact)
    })
}

fn non_empty(table: &ReferenceTable, row: usize, column: Option<usize>) -> Option<&str> {
    column.and_then(|column| table.cell_at(row, column)).filter(|value| !value.is_empty())
}

fn with_implicit_dependencies(mut definitions: Vec<FieldDefinition>) -> Vec<FieldDefinition> {
    let implied = definitions
        .iter()
        .map(|definition| {
            definition
                .role
                .implicit_dependencies()
                .iter()
                .filter_map(|role| definitions.iter().find(|candidate| candidate.role == *role))
                .map(|candidate| candidate.id.0.clone())
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    definitions
        .drain(..)
        .zip(implied)
        .map(|(definition, implied)| {
            implied.into_iter().fold(definition, |definition, dependency| {
                definition.with_dependency(dependency)
            })
        })
        .collect()
}

/// Kahn's algorithm; ties are broken by schema order so the result is stable.
fn topological_order(
    fields: &[FieldDefinition],
    dependencies: &[Vec<usize>],
    dependents: &[Vec<usize>],
) -> Result<Vec<usize>, ConfigurationError> {
    let mut pending = dependencies.iter().map(Vec::len).collect::<Vec<_>>();
    let mut ready = pending
        .iter()
        .enumerate()
        .filter(|(_, count)| **count == 0)
        .map(|(position, _)| position)
        .collect::<BTreeSet<_>>();
    let mut order = Vec::with_capacity(fields.len());

    while let Some(next) = ready.pop_first() {
        order.push(next);
        for &dependent in &dependents[next] {
            pending[dependent] -= 1;
            if pending[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() == fields.len() {
        return Ok(order);
    }

    let blocked = (0..fields.len()).filter(|position| pending[*position] > 0).collect();
    let cycle = find_cycle(&blocked, dependencies)
        .into_iter()
        .map(|position| fields[position].id.clone())
        .collect();
    Err(ConfigurationError::CyclicDependency { cycle })
}

/// Every blocked field waits on another blocked field, so walking dependencies
/// from any of them must revisit a field.
fn find_cycle(blocked: &BTreeSet<usize>, dependencies: &[Vec<usize>]) -> Vec<usize> {
    let Some(&start) = blocked.first() else {
        return Vec::new();
    };

    let mut path = Vec::new();
    let mut current = start;
    loop {
        if let Some(seen_at) = path.iter().position(|position| *position == current) {
            let mut cycle = path.split_off(seen_at);
            cycle.push(current);
            return cycle;
        }
        path.push(current);
        match dependencies[current].iter().find(|dependency| blocked.contains(*dependency)) {
            Some(&next) => current = next,
            None => return path,
        }
    }
}
