use std::fmt;
use std::time::Duration;

use super::duration::format_duration;

/// 绑定结果
///
/// 与 `TypeDescriptor` 一一对应，`Display` 输出可以被重新绑定为相等的值
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Char(char),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Duration(Duration),
    List(Vec<Value>),
    /// 保持 key 出现顺序
    Multimap(Vec<(String, Vec<Value>)>),
}

fn join(f: &mut fmt::Formatter<'_>, values: &[Value]) -> fmt::Result {
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(f, "{}", value)?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{}", v),
            Self::Char(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Long(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Double(v) => write!(f, "{}", v),
            Self::String(v) => write!(f, "{}", v),
            Self::Duration(v) => write!(f, "{}", format_duration(*v)),
            Self::List(values) => join(f, values),
            Self::Multimap(entries) => {
                for (i, (key, values)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}=", key)?;
                    join(f, values)?;
                }
                Ok(())
            }
        }
    }
}
