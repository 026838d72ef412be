//! Data Definition Language (DDL) representation
//!
//! Name-based descriptions of tables and of the operations applied to them.
//! These are what the classifier compares and what the executor and the
//! merge flow turn into builder calls.

use serde::{Serialize, Deserialize};

use crate::ais::Ais;
use crate::error::Result;
use crate::models::{
    ColumnDefinition, ColumnId, ForeignKeyDefinition, GroupName, IndexKind, JoinType, TableId, TableName,
};

/// Secondary index of a table definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    /// Index name
    pub name: String,

    /// Unique index
    pub unique: bool,

    /// Key column names
    pub columns: Vec<String>,
}

/// One (parent column, child column) pair of a grouping foreign key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinColumnDefinition {
    /// Parent primary key column
    pub parent: String,

    /// Referencing column of the child
    pub child: String,
}

/// The grouping foreign key of a table: the link to its parent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupingReference {
    /// Constraint name
    pub name: String,

    /// Parent table
    pub parent: TableName,

    /// Column pairs in parent key order
    pub columns: Vec<JoinColumnDefinition>,
}

/// A child's grouping foreign key as seen from the parent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildReference {
    /// Child table
    pub child: TableName,

    /// Columns of this table the child references
    pub parent_columns: Vec<String>,
}

/// Definition of a table by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    /// Name of the table
    pub name: TableName,

    /// Columns in position order
    pub columns: Vec<ColumnDefinition>,

    /// Primary key column names; empty for a table without one
    pub primary_key: Vec<String>,

    /// Secondary indexes
    #[serde(default)]
    pub indexes: Vec<IndexDefinition>,

    /// Link to the parent table, if grouped under one
    #[serde(default)]
    pub grouping: Option<GroupingReference>,

    /// Ordinary foreign keys
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyDefinition>,

    /// Grouping links of child tables to this one
    #[serde(default)]
    pub children: Vec<ChildReference>,
}

impl TableDefinition {
    /// Empty definition
    pub fn new(schema: &str, name: &str) -> Self {
        TableDefinition {
            name: TableName::new(schema, name),
            columns: Vec::new(),
            primary_key: Vec::new(),
            indexes: Vec::new(),
            grouping: None,
            foreign_keys: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Append a column
    pub fn column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    /// Set the primary key
    pub fn primary_key<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.primary_key = columns.iter().map(|c| c.as_ref().to_string()).collect();
        self
    }

    /// Add a secondary index
    pub fn index<S: AsRef<str>>(mut self, name: &str, unique: bool, columns: &[S]) -> Self {
        self.indexes.push(IndexDefinition {
            name: name.to_string(),
            unique,
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
        });
        self
    }

    /// Group this table under `parent` through `columns`, given as (parent
    /// column, child column) pairs
    pub fn grouped_under<S: AsRef<str>>(mut self, name: &str, parent: TableName, columns: &[(S, S)]) -> Self {
        self.grouping = Some(GroupingReference {
            name: name.to_string(),
            parent,
            columns: columns
                .iter()
                .map(|(p, c)| JoinColumnDefinition {
                    parent: p.as_ref().to_string(),
                    child: c.as_ref().to_string(),
                })
                .collect(),
        });
        self
    }

    /// Add an ordinary foreign key
    pub fn foreign_key(mut self, foreign_key: ForeignKeyDefinition) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    /// Column by name
    pub fn find_column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Secondary index by name
    pub fn find_index(&self, name: &str) -> Option<&IndexDefinition> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// Describe a catalog table
    pub fn from_ais(ais: &Ais, table: TableId) -> Result<Self> {
        let t = ais.require_table(table)?;
        let names = |ids: Vec<ColumnId>| -> Vec<String> { ids.into_iter().map(|c| ais.column_name(c)).collect() };

        let grouping = ais.parent_join(table).map(|join| GroupingReference {
            name: join.name.clone(),
            parent: ais
                .table(join.parent)
                .map(|p| p.name.clone())
                .unwrap_or_else(|| TableName::new("", join.parent.to_string())),
            columns: join
                .columns
                .iter()
                .map(|jc| JoinColumnDefinition {
                    parent: ais.column_name(jc.parent),
                    child: ais.column_name(jc.child),
                })
                .collect(),
        });
        let children = ais
            .child_joins(table)
            .into_iter()
            .filter_map(|join| {
                ais.table(join.child).map(|child| ChildReference {
                    child: child.name.clone(),
                    parent_columns: join.columns.iter().map(|jc| ais.column_name(jc.parent)).collect(),
                })
            })
            .collect();

        Ok(TableDefinition {
            name: t.name.clone(),
            columns: ais.columns_of(table).into_iter().map(ColumnDefinition::from).collect(),
            primary_key: names(ais.primary_key_columns(table)),
            indexes: ais
                .indexes_of(table)
                .into_iter()
                .map(|index| IndexDefinition {
                    name: index.name.clone(),
                    unique: index.kind == IndexKind::Unique,
                    columns: names(index.column_ids()),
                })
                .collect(),
            grouping,
            foreign_keys: t.foreign_keys.clone(),
            children,
        })
    }
}

/// Kind of a per-column or per-index change descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeType {
    /// Added in the new definition
    Add,
    /// Removed from the old definition
    Drop,
    /// Present in both, possibly renamed
    Modify,
}

/// One column or index change of an ALTER TABLE
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableChange {
    /// What happened
    pub change_type: ChangeType,

    /// Name in the old definition; absent for adds
    pub old_name: Option<String>,

    /// Name in the new definition; absent for drops
    pub new_name: Option<String>,
}

impl TableChange {
    /// Something called `name` was added
    pub fn add(name: &str) -> Self {
        TableChange {
            change_type: ChangeType::Add,
            old_name: None,
            new_name: Some(name.to_string()),
        }
    }

    /// Something called `name` was dropped
    pub fn drop(name: &str) -> Self {
        TableChange {
            change_type: ChangeType::Drop,
            old_name: Some(name.to_string()),
            new_name: None,
        }
    }

    /// `old` was changed and is now called `new`
    pub fn modify(old: &str, new: &str) -> Self {
        TableChange {
            change_type: ChangeType::Modify,
            old_name: Some(old.to_string()),
            new_name: Some(new.to_string()),
        }
    }
}

/// DDL operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DdlOperation {
    /// Create a table, grouped under its parent or as a new group root
    CreateTable(TableDefinition),

    /// Drop a childless table
    DropTable(TableName),

    /// Rename a table
    RenameTable(TableName, TableName),

    /// Replace a table's definition
    AlterTable {
        /// Table being altered, by its current name
        table: TableName,
        /// Complete new definition
        definition: TableDefinition,
        /// Column change descriptors
        column_changes: Vec<TableChange>,
        /// Index change descriptors
        index_changes: Vec<TableChange>,
    },

    /// Create a group index
    CreateGroupIndex {
        /// Owning group
        group: GroupName,
        /// Index name
        name: String,
        /// Outer-join semantics
        join_type: JoinType,
        /// (table, column) pairs
        columns: Vec<(TableName, String)>,
    },

    /// Drop a group index
    DropGroupIndex {
        /// Owning group
        group: GroupName,
        /// Index name
        name: String,
    },
}

impl DdlOperation {
    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            DdlOperation::CreateTable(_) => "CREATE TABLE",
            DdlOperation::DropTable(_) => "DROP TABLE",
            DdlOperation::RenameTable(_, _) => "RENAME TABLE",
            DdlOperation::AlterTable { .. } => "ALTER TABLE",
            DdlOperation::CreateGroupIndex { .. } => "CREATE GROUP INDEX",
            DdlOperation::DropGroupIndex { .. } => "DROP GROUP INDEX",
        }
    }
}
