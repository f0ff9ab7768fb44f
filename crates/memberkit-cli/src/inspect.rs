//! # Inspect Subcommand
//!
//! Builds every class in a schema and prints its layout: members with
//! their storage index and modes, fixed slots, and whether instances carry
//! a dict.

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use memberkit_object::Class;

use crate::schema;

/// Arguments for the inspect subcommand.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Path to the YAML class schema.
    #[arg(long)]
    pub schema: PathBuf,
}

/// Run the inspect subcommand.
pub fn run(args: &InspectArgs) -> anyhow::Result<()> {
    let registry = schema::load(&args.schema)
        .with_context(|| format!("loading {}", args.schema.display()))?;
    let registry = registry.read();
    for class in registry.classes() {
        tracing::info!(
            class = %class.name(),
            members = class.member_count(),
            slots = class.slot_count(),
            dict = class.has_dict(),
            "class layout"
        );
        print!("{}", describe(class)?);
    }
    Ok(())
}

/// Render a class layout as indented text.
pub fn describe(class: &Class) -> anyhow::Result<String> {
    let mut out = String::new();
    let bases: Vec<&str> = class.bases().iter().map(Class::name).collect();
    if bases.is_empty() {
        writeln!(out, "{}", class.name())?;
    } else {
        writeln!(out, "{}({})", class.name(), bases.join(", "))?;
    }
    for member in class.members() {
        writeln!(
            out,
            "  member {:<12} index={} validate={:?} default={:?}",
            member.name(),
            member.index(),
            member.validate_mode(),
            member.default_value_mode()
        )?;
    }
    let slots = class
        .slot_names()
        .with_context(|| format!("listing slots of {}", class.name()))?;
    if !slots.is_empty() {
        writeln!(out, "  slots  {}", slots.join(", "))?;
    }
    writeln!(out, "  dict   {}", class.has_dict())?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_members_slots_and_dict() {
        let registry = schema::build_str(
            r#"
classes:
  - name: Base
    slots: [a]
  - name: Child
    bases: [Base]
    slots: [b, __dict__]
    members:
      - { name: x, kind: typed, type: int }
"#,
        )
        .unwrap();
        let child = registry.read().class("Child").cloned().unwrap();
        let text = describe(&child).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Child(Base)");
        assert!(lines[1].starts_with("  member x"));
        assert!(lines[1].contains("index=0"));
        assert_eq!(lines[2], "  slots  b, a");
        assert_eq!(lines[3], "  dict   true");
    }
}
