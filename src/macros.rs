//! 配置类型到实现类型的转换宏

/// 为配置类型实现 `From<Config>`
///
/// `impl_from!(ConfigType => Type)` 展开为调用 `Type::new(config)`
///
/// 构造可能失败的类型不使用此宏，直接通过 `SourceFactory::register_with` 注册
#[macro_export]
macro_rules! impl_from {
    ($config_type:ty => $target_type:ty) => {
        impl From<$config_type> for $target_type {
            fn from(config: $config_type) -> Self {
                <$target_type>::new(config)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    #[derive(Debug, Clone)]
    struct PollConfig {
        interval_sec: u64,
    }

    #[derive(Debug)]
    struct Poller {
        interval_sec: u64,
    }

    impl Poller {
        fn new(config: PollConfig) -> Self {
            Self {
                interval_sec: config.interval_sec,
            }
        }
    }

    impl_from!(PollConfig => Poller);

    #[test]
    fn test_impl_from_new() {
        let poller = Poller::from(PollConfig { interval_sec: 15 });
        assert_eq!(poller.interval_sec, 15);
    }
}
