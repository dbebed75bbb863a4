//! Introspectable schema of every callable operation.
use serde::Serialize;

use crate::types::BandFormat;

/// Accepted argument type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "values", rename_all = "kebab-case")]
pub enum ParamKind {
    Image,
    Int,
    Double,
    Bool,
    Str,
    DoubleArray,
    /// A string drawn from a fixed set
    Enum(&'static [&'static str]),
}

impl ParamKind {
    pub fn name(&self) -> &'static str {
        match self {
            ParamKind::Image => "image",
            ParamKind::Int => "int",
            ParamKind::Double => "double",
            ParamKind::Bool => "bool",
            ParamKind::Str => "str",
            ParamKind::DoubleArray => "double-array",
            ParamKind::Enum(_) => "enum",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub description: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub params: Vec<ParamSpec>,
    pub returns: ParamKind,
}

impl OperationSpec {
    pub fn required(&self) -> impl Iterator<Item = &ParamSpec> {
        self.params.iter().filter(|p| p.required)
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }
}

const fn req(name: &'static str, kind: ParamKind, description: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        kind,
        required: true,
        description,
    }
}

const fn opt(name: &'static str, kind: ParamKind, description: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        kind,
        required: false,
        description,
    }
}

fn spec(
    name: &'static str,
    description: &'static str,
    params: Vec<ParamSpec>,
    returns: ParamKind,
) -> OperationSpec {
    OperationSpec {
        name,
        description,
        params,
        returns,
    }
}

/// Schemas in catalog order.
pub(crate) fn specs() -> Vec<OperationSpec> {
    use ParamKind::*;
    let input = || req("in", Image, "Input image");
    vec![
        spec(
            "black",
            "make a black image",
            vec![
                req("width", Int, "Image width in pixels"),
                req("height", Int, "Image height in pixels"),
                opt("bands", Int, "Number of bands in image"),
            ],
            Image,
        ),
        spec(
            "xyz",
            "make an image where pixel values are coordinates",
            vec![
                req("width", Int, "Image width in pixels"),
                req("height", Int, "Image height in pixels"),
            ],
            Image,
        ),
        spec(
            "grey",
            "make a grey ramp image",
            vec![
                req("width", Int, "Image width in pixels"),
                req("height", Int, "Image height in pixels"),
            ],
            Image,
        ),
        spec(
            "linear",
            "calculate (a * in + b)",
            vec![
                input(),
                req("a", DoubleArray, "Multiply by this"),
                req("b", DoubleArray, "Add this"),
            ],
            Image,
        ),
        spec("invert", "invert an image", vec![input()], Image),
        spec(
            "cast",
            "cast an image",
            vec![
                input(),
                req("format", Enum(&BandFormat::NAMES), "Format to cast to"),
            ],
            Image,
        ),
        spec(
            "extract_area",
            "extract an area from an image",
            vec![
                input(),
                req("left", Int, "Left edge of extract area"),
                req("top", Int, "Top edge of extract area"),
                req("width", Int, "Width of extract area"),
                req("height", Int, "Height of extract area"),
            ],
            Image,
        ),
        spec(
            "extract_band",
            "extract band from an image",
            vec![
                input(),
                req("band", Int, "Band to extract"),
                opt("n", Int, "Number of bands to extract"),
            ],
            Image,
        ),
        spec(
            "resize",
            "resize an image",
            vec![input(), req("scale", Double, "Scale image by this factor")],
            Image,
        ),
        spec("max", "find image maximum", vec![input()], Double),
        spec("min", "find image minimum", vec![input()], Double),
        spec("avg", "find image average", vec![input()], Double),
        spec(
            "copy",
            "evaluate an image into memory",
            vec![input()],
            Image,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_names_are_unique() {
        let specs = specs();
        let mut names: Vec<_> = specs.iter().map(|s| s.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), specs.len());
    }

    #[test]
    fn required_params_come_first() {
        for spec in specs() {
            let first_optional = spec.params.iter().position(|p| !p.required);
            if let Some(pos) = first_optional {
                assert!(spec.params[pos..].iter().all(|p| !p.required), "{}", spec.name);
            }
        }
    }

    #[test]
    fn schema_serializes_with_kind_tags() {
        let cast = specs().into_iter().find(|s| s.name == "cast").unwrap();
        let json = serde_json::to_value(&cast).unwrap();
        assert_eq!(json["params"][1]["kind"]["type"], "enum");
        assert_eq!(json["params"][1]["kind"]["values"][0], "uchar");
        assert_eq!(json["returns"]["type"], "image");
    }
}
