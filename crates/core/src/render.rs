//! Canonical text form of a compiled statement.
//!
//! Conditions are written as `WITH <field> <OPERATOR> <value>` with the
//! single-token operator spelling, so the output parses back to an
//! equivalent statement as long as values contain no whitespace.

use crate::statement::PermissionStatement;
use std::fmt;

impl fmt::Display for PermissionStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command())?;
        for (i, access) in self.access_types().iter().enumerate() {
            if i > 0 {
                f.write_str(" &")?;
            }
            write!(f, " {}", access)?;
        }
        write!(f, " ACCESS TO {}", self.resource_type())?;
        for (i, condition) in self.conditions().iter().enumerate() {
            if i > 0 {
                write!(f, " {}", condition.logical_operator)?;
            }
            write!(
                f,
                " WITH {} {} {}",
                condition.field, condition.operator, condition.value
            )?;
        }
        Ok(())
    }
}
