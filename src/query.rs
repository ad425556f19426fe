use crate::domain::SpeciesRequest;
use crate::error::PhyloError;

/// Builds the search expression sent to the nucleotide database for one
/// species. With no template the default Entrez expression is emitted with
/// the length bounds inserted verbatim; a caller template goes through
/// [`substitute`] and fails fast on any malformed or unsupplied field.
pub fn build_query(
    request: &SpeciesRequest,
    template: Option<&str>,
    template_values: &[String],
) -> Result<String, PhyloError> {
    let SpeciesRequest {
        species_name,
        gene_name,
        min_length,
        max_length,
    } = request;

    match template {
        None => Ok(format!(
            "{species_name}[Organism] AND {gene_name}[All Fields] AND {min_length}:{max_length}[Sequence Length]"
        )),
        Some(template) => {
            let named = [
                ("species", species_name.clone()),
                ("gene_name", gene_name.clone()),
                ("min_length", min_length.to_string()),
                ("max_length", max_length.to_string()),
            ];
            substitute(template, template_values, &named)
        }
    }
}

/// String substitution over `{}` / `{0}` / `{name}` replacement fields, with
/// `{{` and `}}` as literal braces. Extra positional values fill the
/// numbered fields, the named slots fill the rest. Automatic and explicit
/// numbering must not be mixed, and format specs are rejected.
pub fn substitute(
    template: &str,
    positional: &[String],
    named: &[(&str, String)],
) -> Result<String, PhyloError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    let mut auto_index = 0usize;
    let mut auto_seen = false;
    let mut manual_seen = false;

    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => {
                return Err(PhyloError::Template(
                    "single '}' encountered in template".to_string(),
                ));
            }
            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(inner) => field.push(inner),
                        None => {
                            return Err(PhyloError::Template(
                                "unterminated replacement field".to_string(),
                            ));
                        }
                    }
                }
                out.push_str(resolve_field(
                    &field,
                    positional,
                    named,
                    &mut auto_index,
                    &mut auto_seen,
                    &mut manual_seen,
                )?);
            }
            _ => out.push(ch),
        }
    }

    Ok(out)
}

fn resolve_field<'a>(
    field: &str,
    positional: &'a [String],
    named: &'a [(&str, String)],
    auto_index: &mut usize,
    auto_seen: &mut bool,
    manual_seen: &mut bool,
) -> Result<&'a str, PhyloError> {
    if field.contains(':') || field.contains('!') {
        return Err(PhyloError::Template(format!(
            "format specs are not supported: {{{field}}}"
        )));
    }

    if field.is_empty() {
        if *manual_seen {
            return Err(PhyloError::Template(
                "cannot mix automatic and explicit field numbering".to_string(),
            ));
        }
        *auto_seen = true;
        let index = *auto_index;
        *auto_index += 1;
        return positional.get(index).map(String::as_str).ok_or_else(|| {
            PhyloError::Template(format!("positional value {index} not supplied"))
        });
    }

    if field.chars().all(|c| c.is_ascii_digit()) {
        if *auto_seen {
            return Err(PhyloError::Template(
                "cannot mix automatic and explicit field numbering".to_string(),
            ));
        }
        *manual_seen = true;
        let index = field
            .parse::<usize>()
            .map_err(|_| PhyloError::Template(format!("invalid positional index {field}")))?;
        return positional.get(index).map(String::as_str).ok_or_else(|| {
            PhyloError::Template(format!("positional value {index} not supplied"))
        });
    }

    named
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, value)| value.as_str())
        .ok_or_else(|| PhyloError::Template(format!("unknown field `{field}`")))
}
