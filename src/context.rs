use crate::{host::BINDINGS, platform::Platform, runtime::Interpreter, streams::Streams, value::Value};

/// Creates an isolated execution context whose global namespace holds the
/// engine intrinsics plus the host functions.
pub fn create_context(platform: &Platform, streams: Streams) -> Interpreter {
    let interp = Interpreter::new(platform, streams);
    {
        let mut global = interp.global().borrow_mut();
        for (name, callback) in BINDINGS {
            global.define(*name, Value::native(*name, *callback), true);
        }
    }
    interp
}
