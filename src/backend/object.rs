//! Object emission with Cranelift
//!
//! Integer exports become `extern "C" fn() -> i64` returning the constant;
//! string exports become NUL-terminated read-only data symbols.

use cranelift::prelude::*;
use cranelift_module::{DataDescription, Linkage, Module};
use cranelift_object::{ObjectBuilder, ObjectModule};
use tracing::{debug, trace};

use super::{BackendError, EmitOptions};
use crate::runtime::{Export, ExportValue};

/// Build a relocatable object for the host and return its bytes.
pub fn emit_object(
    name: &str,
    exports: &[Export],
    options: &EmitOptions,
) -> Result<Vec<u8>, BackendError> {
    let mut flag_builder = settings::builder();
    flag_builder
        .set("is_pic", "true")
        .map_err(|e| BackendError::Cranelift(format!("Failed to set is_pic: {}", e)))?;
    flag_builder
        .set("opt_level", if options.optimize { "speed" } else { "none" })
        .map_err(|e| BackendError::Cranelift(format!("Failed to set opt_level: {}", e)))?;

    let isa_builder = cranelift_native::builder()
        .map_err(|e| BackendError::Cranelift(format!("Failed to create ISA builder: {}", e)))?;

    let isa = isa_builder
        .finish(settings::Flags::new(flag_builder))
        .map_err(|e| BackendError::Cranelift(format!("Failed to create ISA: {}", e)))?;
    debug!("target: {}", isa.triple());

    let builder = ObjectBuilder::new(isa, name, cranelift_module::default_libcall_names())?;
    let mut module = ObjectModule::new(builder);
    let mut ctx = module.make_context();
    let mut builder_ctx = FunctionBuilderContext::new();

    for export in exports {
        match &export.value {
            ExportValue::Integer(n) => {
                trace!("function {} -> {}", export.name, n);
                ctx.func.signature.returns.push(AbiParam::new(types::I64));
                let id = module.declare_function(&export.name, Linkage::Export, &ctx.func.signature)?;

                {
                    let mut builder = FunctionBuilder::new(&mut ctx.func, &mut builder_ctx);
                    let block = builder.create_block();
                    builder.switch_to_block(block);
                    builder.seal_block(block);
                    let value = builder.ins().iconst(types::I64, *n);
                    builder.ins().return_(&[value]);
                    builder.finalize();
                }

                module.define_function(id, &mut ctx)?;
                module.clear_context(&mut ctx);
            }
            ExportValue::Bytes(bytes) => {
                trace!("data {} ({} bytes)", export.name, bytes.len());
                let id = module.declare_data(&export.name, Linkage::Export, false, false)?;

                let mut contents = bytes.clone();
                contents.push(0);
                let mut description = DataDescription::new();
                description.define(contents.into_boxed_slice());
                module.define_data(id, &description)?;
            }
        }
    }

    module
        .finish()
        .emit()
        .map_err(|e| BackendError::Cranelift(format!("Failed to write object: {}", e)))
}
