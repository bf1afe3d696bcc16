use stm32ral::{flash, rcc};
use stm32ral::{modify_reg, read_reg, reset_reg};

pub struct RCC {
    rcc: rcc::Instance,
}

impl RCC {
    pub fn new(rcc: rcc::Instance) -> Self {
        RCC { rcc }
    }

    /// Bring the part up to 72MHz from an 8MHz HSE crystal (PLLMUL x9),
    /// the maximum SYSCLK the connectivity-line part supports, and enable
    /// the peripheral clocks the flux engine and GPIO ports need.
    ///
    /// Unsafety: this function should be called from the main context.
    /// No other contexts should be active at the same time.
    pub unsafe fn setup(&self) -> Clocks {
        // Turn on HSI and swap to it while we reconfigure everything else.
        modify_reg!(rcc, self.rcc, CR, HSION: On);
        while read_reg!(rcc, self.rcc, CR, HSIRDY == NotReady) {}
        modify_reg!(rcc, self.rcc, CFGR, SW: HSI);
        while read_reg!(rcc, self.rcc, CFGR, SWS != HSI) {}

        modify_reg!(rcc, self.rcc, CR, HSEON: Off, CSSON: Off, PLLON: Off);
        reset_reg!(rcc, self.rcc, RCC, AHBENR);
        reset_reg!(rcc, self.rcc, RCC, APB1ENR);
        reset_reg!(rcc, self.rcc, RCC, APB2ENR);

        modify_reg!(rcc, self.rcc, CR, HSEON: On);
        while read_reg!(rcc, self.rcc, CR, HSERDY == NotReady) {}

        // AHB at 72MHz, APB1 (36MHz max) divided by 2, APB2 undivided.
        modify_reg!(rcc, self.rcc, CFGR, HPRE: Div1, PPRE1: Div2, PPRE2: Div1);

        modify_reg!(
            rcc,
            self.rcc,
            CFGR,
            PLLSRC: HSE_Div_PREDIV,
            PLLXTPRE: Div1,
            PLLMUL: Mul9
        );

        // Two flash wait states required above 48MHz at 3.3V.
        modify_reg!(flash, &*flash::FLASH, ACR, LATENCY: WS2);

        modify_reg!(rcc, self.rcc, CR, PLLON: On);
        while read_reg!(rcc, self.rcc, CR, PLLRDY == NotReady) {}

        modify_reg!(rcc, self.rcc, CFGR, SW: PLL);
        while read_reg!(rcc, self.rcc, CFGR, SWS != PLL) {}

        modify_reg!(
            rcc,
            self.rcc,
            AHBENR,
            DMA1EN: Enabled,
            DMA2EN: Enabled
        );
        modify_reg!(
            rcc,
            self.rcc,
            APB2ENR,
            AFIOEN: Enabled,
            IOPAEN: Enabled,
            IOPBEN: Enabled,
            IOPCEN: Enabled,
            IOPDEN: Enabled,
            IOPEEN: Enabled
        );
        modify_reg!(
            rcc,
            self.rcc,
            APB1ENR,
            TIM2EN: Enabled,
            TIM3EN: Enabled,
            TIM4EN: Enabled
        );

        Clocks { sysclk: 72_000_000 }
    }
}

pub struct Clocks {
    sysclk: u32,
}

impl Clocks {
    pub fn hclk(&self) -> u32 {
        let rcc = unsafe { &*rcc::RCC };
        let hpre = read_reg!(rcc, rcc, CFGR, HPRE);
        match hpre {
            0b1000 => self.sysclk / 2,
            0b1001 => self.sysclk / 4,
            0b1010 => self.sysclk / 8,
            0b1011 => self.sysclk / 16,
            0b1100 => self.sysclk / 64,
            0b1101 => self.sysclk / 128,
            0b1110 => self.sysclk / 256,
            0b1111 => self.sysclk / 512,
            _ => self.sysclk,
        }
    }

    pub fn pclk1(&self) -> u32 {
        let hclk = self.hclk();
        let rcc = unsafe { &*rcc::RCC };
        let ppre = read_reg!(rcc, rcc, CFGR, PPRE1);
        match ppre {
            0b100 => hclk / 2,
            0b101 => hclk / 4,
            0b110 => hclk / 8,
            0b111 => hclk / 16,
            _ => hclk,
        }
    }

    pub fn pclk2(&self) -> u32 {
        let hclk = self.hclk();
        let rcc = unsafe { &*rcc::RCC };
        let ppre = read_reg!(rcc, rcc, CFGR, PPRE2);
        match ppre {
            0b100 => hclk / 2,
            0b101 => hclk / 4,
            0b110 => hclk / 8,
            0b111 => hclk / 16,
            _ => hclk,
        }
    }
}
