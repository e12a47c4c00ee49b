//! Exception entry and exit.
//!
//! A vector branches to its stub while translation is still off. The stub
//! parks `r3` and `r4` in SPRG0/1, loads its handler into `r4` and joins
//! the real-mode entry, which parks SRR0/1 in SPRG2/3 and returns into
//! [`virtual_entry`] with translation on. That saves a [`Context`] below
//! the interrupted stack pointer, calls the handler and resumes whatever
//! context the handler returns.
//!
//! Offsets below are those of [`Context`]; `r1` points at the record.

use core::arch::naked_asm;

use super::Exception;
use crate::{
    context::{
        CONTEXT_SIZE, CR_OFFSET, CTR_OFFSET, Context, LR_OFFSET, SRR0_OFFSET, SRR1_OFFSET,
        XER_OFFSET,
    },
    system,
};

const _: () = {
    assert!(CONTEXT_SIZE == 464);
    assert!(CR_OFFSET == 136);
    assert!(LR_OFFSET == 140);
    assert!(CTR_OFFSET == 144);
    assert!(XER_OFFSET == 148);
    assert!(SRR0_OFFSET == 152);
    assert!(SRR1_OFFSET == 156);
};

macro_rules! vectors {
    ($($exception:ident => $stub:ident, $handler:ident;)*) => {
        $(
            extern "C" fn $handler(ctx: &mut Context) -> *mut Context {
                system::DISPATCHER.handle(Exception::$exception, ctx)
            }

            #[unsafe(naked)]
            extern "C" fn $stub() {
                naked_asm!(
                    "mtspr 272, 3",
                    "mtspr 273, 4",
                    "lis 4, {handler}@ha",
                    "addi 4, 4, {handler}@l",
                    "b {entry}",
                    handler = sym $handler,
                    entry = sym real_mode_entry,
                )
            }
        )*

        /// Address of the stub a vector branches to.
        pub(super) fn stub_for(exception: Exception) -> usize {
            match exception {
                $(Exception::$exception => $stub as usize,)*
            }
        }
    };
}

vectors! {
    SystemReset => system_reset_stub, system_reset_handler;
    MachineCheck => machine_check_stub, machine_check_handler;
    Dsi => dsi_stub, dsi_handler;
    Isi => isi_stub, isi_handler;
    External => external_stub, external_handler;
    Alignment => alignment_stub, alignment_handler;
    Program => program_stub, program_handler;
    FpUnavailable => fp_unavailable_stub, fp_unavailable_handler;
    Decrementer => decrementer_stub, decrementer_handler;
    SystemCall => system_call_stub, system_call_handler;
}

/// Turns translation back on without touching the interrupted registers.
#[unsafe(naked)]
extern "C" fn real_mode_entry() {
    naked_asm!(
        "mfsrr0 3",
        "mtspr 274, 3",
        "mfsrr1 3",
        "mtspr 275, 3",
        "lis 3, {entry}@ha",
        "addi 3, 3, {entry}@l",
        "mtsrr0 3",
        "mfmsr 3",
        "ori 3, 3, 0x30",
        "mtsrr1 3",
        "rfi",
        entry = sym virtual_entry,
    )
}

/// Saves the interrupted context and calls the handler in `r4`.
#[unsafe(naked)]
extern "C" fn virtual_entry() {
    naked_asm!(
        "stwu 1, -464(1)",
        "stw 0, 8(1)",
        "stw 2, 16(1)",
        "stmw 5, 28(1)",
        "mfspr 5, 272",
        "stw 5, 20(1)",
        "mfspr 5, 273",
        "stw 5, 24(1)",
        "addi 5, 1, 464",
        "stw 5, 12(1)",
        "mfcr 5",
        "stw 5, 136(1)",
        "mflr 5",
        "stw 5, 140(1)",
        "mfctr 5",
        "stw 5, 144(1)",
        "mfxer 5",
        "stw 5, 148(1)",
        "mfspr 5, 274",
        "stw 5, 152(1)",
        "mfspr 5, 275",
        "stw 5, 156(1)",
            "mfspr 5, 912",
            "stw 5, 160(1)",
            "mfspr 5, 913",
            "stw 5, 164(1)",
            "mfspr 5, 914",
            "stw 5, 168(1)",
            "mfspr 5, 915",
            "stw 5, 172(1)",
            "mfspr 5, 916",
            "stw 5, 176(1)",
            "mfspr 5, 917",
            "stw 5, 180(1)",
            "mfspr 5, 918",
            "stw 5, 184(1)",
            "mfspr 5, 919",
            "stw 5, 188(1)",
        // FP may be off in the interrupted MSR
        "mfmsr 5",
        "ori 5, 5, 0x2000",
        "mtmsr 5",
        "isync",
            "stfd 0, 200(1)",
            "stfd 1, 208(1)",
            "stfd 2, 216(1)",
            "stfd 3, 224(1)",
            "stfd 4, 232(1)",
            "stfd 5, 240(1)",
            "stfd 6, 248(1)",
            "stfd 7, 256(1)",
            "stfd 8, 264(1)",
            "stfd 9, 272(1)",
            "stfd 10, 280(1)",
            "stfd 11, 288(1)",
            "stfd 12, 296(1)",
            "stfd 13, 304(1)",
            "stfd 14, 312(1)",
            "stfd 15, 320(1)",
            "stfd 16, 328(1)",
            "stfd 17, 336(1)",
            "stfd 18, 344(1)",
            "stfd 19, 352(1)",
            "stfd 20, 360(1)",
            "stfd 21, 368(1)",
            "stfd 22, 376(1)",
            "stfd 23, 384(1)",
            "stfd 24, 392(1)",
            "stfd 25, 400(1)",
            "stfd 26, 408(1)",
            "stfd 27, 416(1)",
            "stfd 28, 424(1)",
            "stfd 29, 432(1)",
            "stfd 30, 440(1)",
            "stfd 31, 448(1)",
        "mffs 0",
        "stfd 0, 192(1)",
        "mtctr 4",
        "mr 3, 1",
        "bctrl",
        "b {resume}",
        resume = sym resume_context,
    )
}

/// Loads the context at `ctx` and returns from the exception into it.
///
/// # Safety
///
/// `ctx` must be a complete context record at the top of the stack it
/// describes, and external interrupts must be disabled.
#[unsafe(naked)]
pub(crate) unsafe extern "C" fn resume_context(ctx: *mut Context) -> ! {
    naked_asm!(
        "mr 1, 3",
        "mfmsr 5",
        "ori 5, 5, 0x2000",
        "mtmsr 5",
        "isync",
        "lfd 0, 192(1)",
        "mtfsf 0xff, 0",
            "lfd 0, 200(1)",
            "lfd 1, 208(1)",
            "lfd 2, 216(1)",
            "lfd 3, 224(1)",
            "lfd 4, 232(1)",
            "lfd 5, 240(1)",
            "lfd 6, 248(1)",
            "lfd 7, 256(1)",
            "lfd 8, 264(1)",
            "lfd 9, 272(1)",
            "lfd 10, 280(1)",
            "lfd 11, 288(1)",
            "lfd 12, 296(1)",
            "lfd 13, 304(1)",
            "lfd 14, 312(1)",
            "lfd 15, 320(1)",
            "lfd 16, 328(1)",
            "lfd 17, 336(1)",
            "lfd 18, 344(1)",
            "lfd 19, 352(1)",
            "lfd 20, 360(1)",
            "lfd 21, 368(1)",
            "lfd 22, 376(1)",
            "lfd 23, 384(1)",
            "lfd 24, 392(1)",
            "lfd 25, 400(1)",
            "lfd 26, 408(1)",
            "lfd 27, 416(1)",
            "lfd 28, 424(1)",
            "lfd 29, 432(1)",
            "lfd 30, 440(1)",
            "lfd 31, 448(1)",
            "lwz 5, 160(1)",
            "mtspr 912, 5",
            "lwz 5, 164(1)",
            "mtspr 913, 5",
            "lwz 5, 168(1)",
            "mtspr 914, 5",
            "lwz 5, 172(1)",
            "mtspr 915, 5",
            "lwz 5, 176(1)",
            "mtspr 916, 5",
            "lwz 5, 180(1)",
            "mtspr 917, 5",
            "lwz 5, 184(1)",
            "mtspr 918, 5",
            "lwz 5, 188(1)",
            "mtspr 919, 5",
        "lwz 5, 136(1)",
        "mtcr 5",
        "lwz 5, 140(1)",
        "mtlr 5",
        "lwz 5, 144(1)",
        "mtctr 5",
        "lwz 5, 148(1)",
        "mtxer 5",
        "lwz 5, 152(1)",
        "mtsrr0 5",
        "lwz 5, 156(1)",
        "mtsrr1 5",
        "lwz 0, 8(1)",
        "lwz 2, 16(1)",
        "lwz 3, 20(1)",
        "lwz 4, 24(1)",
        "lmw 5, 28(1)",
        "lwz 1, 12(1)",
        "rfi",
    )
}
