use std::rc::Rc;

use sigmut::SignalContext;

use crate::{
    field::{Field, FieldVariant},
    form::Form,
};


#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Segment {
    Name(String),
    Index(usize),
}

/// Splits `address.line1` / `contacts[2].email` style paths into segments.
/// Returns `None` for anything malformed (empty names, unterminated or
/// non-numeric brackets).
pub(crate) fn parse_path(path: &str) -> Option<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut chars = path.chars().peekable();
    let mut name = String::new();
    let mut after_index = false;
    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if name.is_empty() {
                    if !after_index {
                        return None;
                    }
                } else {
                    segments.push(Segment::Name(std::mem::take(&mut name)));
                }
                after_index = false;
                if chars.peek().is_none() {
                    return None;
                }
            }
            '[' => {
                if name.is_empty() {
                    if !after_index {
                        return None;
                    }
                } else {
                    segments.push(Segment::Name(std::mem::take(&mut name)));
                }
                let mut digits = String::new();
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some(d) if d.is_ascii_digit() => digits.push(d),
                        _ => return None,
                    }
                }
                let index = digits.parse().ok()?;
                segments.push(Segment::Index(index));
                after_index = true;
            }
            ']' => return None,
            _ => {
                if after_index {
                    return None;
                }
                name.push(c);
            }
        }
    }
    if !name.is_empty() {
        segments.push(Segment::Name(name));
    }
    if segments.is_empty() {
        return None;
    }
    Some(segments)
}

/// Resolves a field anywhere in a form tree by path string.
///
/// A name segment looks up a field in the current form; descending continues
/// through nested groups' child forms, and an index segment following a
/// repeatable group selects one of its child forms. Any structural mismatch
/// (unknown name, index on a non-repeatable field, out-of-range index)
/// yields `None` rather than panicking.
pub fn find_field_by_path(form: &Form, path: &str, sc: &mut SignalContext) -> Option<Rc<Field>> {
    let segments = parse_path(path)?;
    let mut current = form.clone();
    let mut pending_group: Option<Rc<Field>> = None;
    let last = segments.len() - 1;
    for (i, segment) in segments.iter().enumerate() {
        match segment {
            Segment::Name(name) => {
                if pending_group.is_some() {
                    return None;
                }
                let field = current.try_field(name)?.clone();
                if i == last {
                    return Some(field);
                }
                match field.variant() {
                    FieldVariant::NestedGroup(child) => current = child.clone(),
                    FieldVariant::RepeatableGroup(_) => pending_group = Some(field),
                    _ => return None,
                }
            }
            Segment::Index(index) => {
                let field = pending_group.take()?;
                let children = field.repeatable_forms(sc);
                let child = children.get(*index)?;
                if i == last {
                    return None;
                }
                current = child.clone();
            }
        }
    }
    None
}
