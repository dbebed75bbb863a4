//! Argument binding and dispatch for the generic `call` surface.
use std::collections::HashMap;

use tracing::debug;

use super::catalog::{OperationSpec, ParamKind, ParamSpec};
use crate::api::Image;
use crate::error::{Error, Result};
use crate::native::TileRect;
use crate::types::{BandFormat, Value};

/// Arguments after binding, keyed by parameter name.
pub(crate) struct Arguments {
    values: HashMap<&'static str, Value>,
}

impl Arguments {
    fn get(&self, name: &str) -> Result<&Value> {
        self.values.get(name).ok_or_else(|| Error::MissingArgument {
            arg: name.to_string(),
        })
    }

    fn image(&self, name: &str) -> Result<&Image> {
        let value = self.get(name)?;
        value.as_image().ok_or_else(|| Error::invalid(name, value))
    }

    fn count(&self, name: &str) -> Result<usize> {
        let value = self.get(name)?;
        value
            .as_i64()
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(|| Error::invalid(name, value))
    }

    fn count_or(&self, name: &str, default: usize) -> Result<usize> {
        if self.values.contains_key(name) {
            self.count(name)
        } else {
            Ok(default)
        }
    }

    fn double(&self, name: &str) -> Result<f64> {
        let value = self.get(name)?;
        value.as_f64().ok_or_else(|| Error::invalid(name, value))
    }

    fn doubles(&self, name: &str) -> Result<&[f64]> {
        match self.get(name)? {
            Value::DoubleArray(v) => Ok(v),
            other => Err(Error::invalid(name, other)),
        }
    }

    fn format(&self, name: &str) -> Result<BandFormat> {
        let value = self.get(name)?;
        value
            .as_str()
            .and_then(BandFormat::from_name)
            .ok_or_else(|| Error::invalid(name, value))
    }
}

type Runner = fn(&Arguments) -> Result<Value>;

/// Engine entry point for each catalog name.
fn runner(name: &str) -> Option<Runner> {
    let run: Runner = match name {
        "black" => |a: &Arguments| {
            let image = Image::black(a.count("width")?, a.count("height")?, a.count_or("bands", 1)?)?;
            Ok(Value::Image(image))
        },
        "xyz" => |a: &Arguments| Ok(Value::Image(Image::xyz(a.count("width")?, a.count("height")?)?)),
        "grey" => |a: &Arguments| Ok(Value::Image(Image::grey(a.count("width")?, a.count("height")?)?)),
        "linear" => |a: &Arguments| Ok(Value::Image(a.image("in")?.linear(a.doubles("a")?, a.doubles("b")?)?)),
        "invert" => |a: &Arguments| Ok(Value::Image(a.image("in")?.invert())),
        "cast" => |a: &Arguments| Ok(Value::Image(a.image("in")?.cast(a.format("format")?))),
        "extract_area" => |a: &Arguments| {
            let area = TileRect::new(
                a.count("left")?,
                a.count("top")?,
                a.count("width")?,
                a.count("height")?,
            );
            Ok(Value::Image(a.image("in")?.extract_area(area)?))
        },
        "extract_band" => |a: &Arguments| {
            let image = a.image("in")?.extract_band(a.count("band")?, a.count_or("n", 1)?)?;
            Ok(Value::Image(image))
        },
        "resize" => |a: &Arguments| Ok(Value::Image(a.image("in")?.resize(a.double("scale")?)?)),
        "max" => |a: &Arguments| Ok(Value::Double(a.image("in")?.max()?)),
        "min" => |a: &Arguments| Ok(Value::Double(a.image("in")?.min()?)),
        "avg" => |a: &Arguments| Ok(Value::Double(a.image("in")?.avg()?)),
        "copy" => |a: &Arguments| Ok(Value::Image(a.image("in")?.copy_memory()?)),
        _ => return None,
    };
    Some(run)
}

/// Check `value` against `param`, widening where the kind allows it.
fn coerce(param: &ParamSpec, value: &Value) -> Result<Value> {
    let accepted = match (&param.kind, value) {
        (ParamKind::Image, Value::Image(_))
        | (ParamKind::Int, Value::Int(_))
        | (ParamKind::Bool, Value::Bool(_))
        | (ParamKind::Str, Value::Str(_))
        | (ParamKind::Double, Value::Double(_))
        | (ParamKind::DoubleArray, Value::DoubleArray(_)) => Some(value.clone()),
        (ParamKind::Double, Value::Int(v)) => Some(Value::Double(*v as f64)),
        (ParamKind::DoubleArray, Value::Double(_) | Value::Int(_)) => {
            value.as_f64().map(|v| Value::DoubleArray(vec![v]))
        }
        (ParamKind::Enum(names), Value::Str(s)) if names.contains(&s.as_str()) => Some(value.clone()),
        _ => None,
    };
    accepted.ok_or_else(|| {
        Error::invalid(
            param.name,
            format!("{} ({} expected, got {})", value, param.kind.name(), value.type_name()),
        )
    })
}

fn bind(spec: &OperationSpec, args: &[Value], options: &[(&str, Value)]) -> Result<Arguments> {
    let required: Vec<&ParamSpec> = spec.required().collect();
    if args.len() > required.len() {
        return Err(Error::invalid(
            spec.name,
            format!("{} positional argument(s), {} expected", args.len(), required.len()),
        ));
    }

    let mut values = HashMap::new();
    for (param, value) in required.iter().zip(args) {
        values.insert(param.name, coerce(param, value)?);
    }

    for (name, value) in options {
        let param = spec
            .param(name)
            .ok_or_else(|| Error::invalid(*name, format!("not an argument of {}", spec.name)))?;
        if values.contains_key(param.name) {
            return Err(Error::invalid(*name, "given twice"));
        }
        values.insert(param.name, coerce(param, value)?);
    }

    if let Some(missing) = required.iter().find(|p| !values.contains_key(p.name)) {
        return Err(Error::MissingArgument {
            arg: missing.name.to_string(),
        });
    }
    Ok(Arguments { values })
}

/// Validate and run one operation.
pub(crate) fn invoke(spec: &OperationSpec, args: &[Value], options: &[(&str, Value)]) -> Result<Value> {
    let run = runner(spec.name).ok_or_else(|| Error::UnknownOperation {
        name: spec.name.to_string(),
    })?;
    let bound = bind(spec, args, options)?;
    debug!(
        "Calling {} with {} argument(s)",
        spec.name,
        bound.values.len()
    );
    run(&bound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::operation::catalog::specs;

    fn spec(name: &str) -> OperationSpec {
        specs().into_iter().find(|s| s.name == name).unwrap()
    }

    #[test]
    fn every_catalog_entry_has_a_runner() {
        for spec in specs() {
            assert!(runner(spec.name).is_some(), "{}", spec.name);
        }
    }

    #[test]
    fn int_widens_to_double_and_double_array() {
        let image = Image::black(2, 2, 1).unwrap();
        let bound = bind(
            &spec("linear"),
            &[image.into(), Value::Int(2), Value::Double(0.5)],
            &[],
        )
        .unwrap();
        assert_eq!(bound.doubles("a").unwrap(), &[2.0]);
        assert_eq!(bound.doubles("b").unwrap(), &[0.5]);
    }

    #[test]
    fn enum_outside_set_is_rejected() {
        let image = Image::black(2, 2, 1).unwrap();
        let err = bind(&spec("cast"), &[image.into(), "rgb".into()], &[]).err().unwrap();
        assert!(matches!(err, Error::InvalidArgument { ref arg, .. } if arg == "format"));
    }

    #[test]
    fn options_bind_by_name() {
        let bound = bind(&spec("black"), &[Value::Int(3), Value::Int(4)], &[("bands", Value::Int(2))]).unwrap();
        assert_eq!(bound.count("bands").unwrap(), 2);
        assert_eq!(bound.count_or("missing", 7).unwrap(), 7);
    }

    #[test]
    fn duplicate_binding_is_rejected() {
        let err = bind(&spec("black"), &[Value::Int(3), Value::Int(4)], &[("width", Value::Int(5))])
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidArgument { ref arg, .. } if arg == "width"));
    }

    #[test]
    fn negative_count_names_the_argument() {
        let err = invoke(&spec("black"), &[Value::Int(-1), Value::Int(4)], &[]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { ref arg, .. } if arg == "width"));
    }
}
