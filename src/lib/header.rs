//! SAM header manipulation: sort-order declaration and @PG provenance.
//!
//! The output of a coordinate sort must carry `@HD ... SO:coordinate`. The
//! rewrite here is a structured edit of the parsed header rather than text
//! surgery, so every other header record and every other `@HD` field pass
//! through untouched.

use anyhow::Result;
use bstr::BString;
use noodles::sam::Header;
use noodles::sam::header::record::value::Map;
use noodles::sam::header::record::value::map;
use noodles::sam::header::record::value::map::Program;
use noodles::sam::header::record::value::map::header::tag as header_tag;
use noodles::sam::header::record::value::map::program::tag as pg_tag;
use std::collections::HashSet;

/// Returns true if the header's `@HD` line declares `SO:coordinate`.
#[must_use]
pub fn is_coordinate_sorted(header: &Header) -> bool {
    header
        .header()
        .and_then(|hd| hd.other_fields().get(b"SO"))
        .is_some_and(|so| so.as_slice() == b"coordinate")
}

/// Rewrite the `@HD` line to declare `SO:coordinate`.
///
/// Covers all four layouts with one edit: no `@HD` line (one is
/// synthesized), `@HD` without `SO`, `@HD` with a different `SO`, and `SO`
/// already `coordinate` (the rewrite is a fixpoint). Other `@HD` fields are
/// preserved.
///
/// # Errors
/// Returns an error if the rebuilt `@HD` map is rejected.
pub fn set_coordinate_sorted(header: &mut Header) -> Result<()> {
    let mut builder = Map::<map::Header>::builder();

    if let Some(hd) = header.header() {
        for (tag, value) in hd.other_fields() {
            if *tag != header_tag::SORT_ORDER {
                builder = builder.insert(*tag, value.clone());
            }
        }
    }

    let hd = builder.insert(header_tag::SORT_ORDER, BString::from("coordinate")).build()?;
    *header.header_mut() = Some(hd);
    Ok(())
}

/// Get the ID of the last program in the @PG chain (for PP chaining).
///
/// Finds the program that is not referenced by any other program's PP tag,
/// i.e., the leaf of the chain.
#[must_use]
pub fn get_last_program_id(header: &Header) -> Option<String> {
    let programs = header.programs();
    let program_map = programs.as_ref();

    if program_map.is_empty() {
        return None;
    }

    let mut referenced: HashSet<&[u8]> = HashSet::new();
    for (_id, pg) in program_map {
        if let Some(pp) = pg.other_fields().get(&pg_tag::PREVIOUS_PROGRAM_ID) {
            referenced.insert(pp.as_ref());
        }
    }

    for (id, _pg) in program_map {
        if !referenced.contains(id.as_slice()) {
            return Some(String::from_utf8_lossy(id).to_string());
        }
    }

    // Fallback: return any program ID (shouldn't happen with valid headers)
    program_map.keys().next().map(|id| String::from_utf8_lossy(id).to_string())
}

/// Create a unique program ID by appending .1, .2, etc. if needed.
#[must_use]
pub fn make_unique_program_id(header: &Header, base_id: &str) -> String {
    let programs = header.programs();
    let program_map = programs.as_ref();

    if !program_map.contains_key(base_id.as_bytes()) {
        return base_id.to_string();
    }

    for i in 1..=1000 {
        let candidate = format!("{base_id}.{i}");
        if !program_map.contains_key(candidate.as_bytes()) {
            return candidate;
        }
    }

    // Extremely unlikely fallback
    format!("{base_id}.{}", std::process::id())
}

/// Build a @PG record with all standard fields.
///
/// # Errors
/// Returns an error if the program record cannot be built.
pub fn build_program_record(
    version: &str,
    command_line: &str,
    previous_program: Option<&str>,
) -> Result<Map<Program>> {
    let mut builder = Map::<Program>::builder()
        .insert(pg_tag::NAME, "bamsort")
        .insert(pg_tag::VERSION, version)
        .insert(pg_tag::COMMAND_LINE, command_line);

    if let Some(pp) = previous_program {
        builder = builder.insert(pg_tag::PREVIOUS_PROGRAM_ID, pp);
    }

    Ok(builder.build()?)
}

/// Add a @PG record to a header with automatic PP chaining.
///
/// Finds the last program in the existing @PG chain, creates a unique ID
/// (appending .1, .2 if "bamsort" exists), and adds the new @PG with PP
/// pointing to the previous program.
///
/// # Errors
/// Returns an error if the program record cannot be added to the header.
pub fn add_pg_record(header: &mut Header, version: &str, command_line: &str) -> Result<()> {
    let previous_program = get_last_program_id(header);
    let unique_id = make_unique_program_id(header, "bamsort");
    let pg_record = build_program_record(version, command_line, previous_program.as_deref())?;

    header.programs_mut().add(BString::from(unique_id), pg_record)?;
    Ok(())
}
